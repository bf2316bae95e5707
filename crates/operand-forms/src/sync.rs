//! The edit session: loading the authoritative resource, tracking staleness,
//! merging edits back and driving submission.
//!
//! An [`EditController`] owns one session over one resource. The network is
//! reached exclusively through the [`ResourceClient`] collaborator, and the
//! two data trees are kept strictly apart: `authoritative` is the last object
//! confirmed by the backend (including everything the form does not model,
//! such as status and the concurrency token), `edited` is the form's working
//! copy. Watch updates only ever touch `authoritative`; the single merge
//! point copies the editable subtrees (`metadata` and `spec`) from the edited
//! tree over the live one, preserving every other top-level field.

use kube::core::{DynamicObject, ObjectMeta, TypeMeta};
use serde_json::{Map, Value};
use snafu::{OptionExt, ResultExt, Snafu, ensure};
use tracing::{debug, warn};

use crate::{
    client::{ClientError, ResourceClient, ResourceSelector},
    path::FieldPath,
    prune,
    raw::{self, TextFormat},
    render::{self, RenderedForm},
    schema::StructuralSchema,
    ui::UiSchema,
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display(
        "the default template kind {template:?} does not match the selector kind {selector:?}"
    ))]
    TemplateKindMismatch { template: String, selector: String },

    #[snafu(display(
        "the default template apiVersion {template:?} does not match the selector apiVersion {selector:?}"
    ))]
    TemplateApiVersionMismatch { template: String, selector: String },

    #[snafu(display("the default template must be named {name:?} to satisfy the selector"))]
    TemplateNameMismatch { name: String },

    #[snafu(display("failed to fetch {kind} resources while looking for {name:?}"))]
    FetchMatching {
        source: ClientError,
        kind: String,
        name: String,
    },

    #[snafu(display("failed to load the structural schema for {kind}"))]
    LoadSchema { source: ClientError, kind: String },

    #[snafu(display("failed to mirror the resource into an editable tree"))]
    MirrorResource { source: serde_json::Error },

    #[snafu(display("failed to rebuild resource metadata from the edited tree"))]
    RebuildMetadata { source: serde_json::Error },

    #[snafu(display("another submission is already in flight"))]
    SubmissionInFlight,

    #[snafu(display("the edit session has not finished loading"))]
    SessionNotReady,

    #[snafu(display("failed to serialize the edited resource for the raw editor"))]
    RawSerialize { source: raw::Error },
}

/// Where the edit session currently stands. At most one submission is in
/// flight: the controller only accepts a submit while `Ready`, and returns to
/// `Ready` whether the collaborator succeeds or fails.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionPhase {
    Loading,
    Ready,
    Submitting,
}

/// Behaviour toggles threaded through the controller constructor.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SessionOptions {
    /// Text format of the raw editor escape hatch.
    pub raw_format: TextFormat,

    /// When set, [`EditController::submit`] refuses to hand trees with
    /// validation findings to the collaborator.
    pub gate_on_validation: bool,
}

/// What a submission attempt amounted to. Collaborator failures are not
/// errors: they land in the session's error list and the session stays
/// editable.
#[derive(Clone, Debug)]
pub enum SubmitOutcome {
    /// The backend accepted the create/update; the session has been rebased
    /// on the returned object.
    Applied(DynamicObject),

    /// The backend deleted the resource; the session is over.
    Deleted,

    /// The submission did not go through. Details are in
    /// [`EditSession::errors`].
    Rejected,
}

/// The mutable working state of one edit.
#[derive(Clone, Debug)]
pub struct EditSession {
    authoritative: DynamicObject,
    edited: Value,
    is_update: bool,
    errors: Vec<String>,
    base_token: Option<String>,
    stale: bool,
}

impl EditSession {
    fn start(authoritative: DynamicObject, is_update: bool) -> Result<Self> {
        let edited = serde_json::to_value(&authoritative).context(MirrorResourceSnafu)?;
        let base_token = authoritative.metadata.resource_version.clone();

        Ok(Self {
            authoritative,
            edited,
            is_update,
            errors: Vec::new(),
            base_token,
            stale: false,
        })
    }

    /// The last object confirmed by the backend.
    pub fn authoritative(&self) -> &DynamicObject {
        &self.authoritative
    }

    /// The form's working copy of the resource.
    pub fn edited(&self) -> &Value {
        &self.edited
    }

    /// Whether the resource pre-existed when the session started.
    pub fn is_update(&self) -> bool {
        self.is_update
    }

    /// Submission error messages, oldest first.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Whether another actor updated the resource since editing began.
    pub fn stale(&self) -> bool {
        self.stale
    }
}

/// Builds a minimal default template satisfying the selector contract, for
/// sessions that may create the resource from scratch.
pub fn default_template(selector: &ResourceSelector) -> DynamicObject {
    DynamicObject {
        types: Some(TypeMeta {
            api_version: selector.api_version(),
            kind: selector.kind.clone(),
        }),
        metadata: ObjectMeta {
            name: Some(selector.name.clone()),
            namespace: selector.namespace.clone(),
            ..ObjectMeta::default()
        },
        data: Value::Object(Map::new()),
    }
}

/// Returns a copy of `live` with its editable subtrees (`metadata` and
/// `spec`) replaced by the corresponding subtrees of `edited`. Every other
/// top-level field of `live` is preserved byte-for-byte.
pub fn merge_edits_into_live(live: &DynamicObject, edited: &Value) -> Result<DynamicObject> {
    let mut merged = live.clone();

    if let Some(metadata) = edited.get("metadata") {
        merged.metadata = serde_json::from_value(metadata.clone()).context(RebuildMetadataSnafu)?;
    }

    if !merged.data.is_object() {
        merged.data = Value::Object(Map::new());
    }
    match edited.get("spec") {
        Some(spec) => merged.data["spec"] = spec.clone(),
        None => {
            if let Some(data) = merged.data.as_object_mut() {
                data.remove("spec");
            }
        }
    }

    Ok(merged)
}

/// Drives the full edit-and-submit lifecycle for one resource.
pub struct EditController<C> {
    client: C,
    selector: ResourceSelector,
    default_template: DynamicObject,
    ui: UiSchema,
    options: SessionOptions,
    schema: Option<StructuralSchema>,
    phase: SessionPhase,
    session: Option<EditSession>,
}

impl<C> EditController<C>
where
    C: ResourceClient,
{
    /// Creates a controller for the resource the selector names.
    ///
    /// The default template is used verbatim as the editing base when no
    /// resource exists yet, so it must already carry the selector's identity.
    /// A mismatch is fatal here; no partial session is ever created.
    pub fn new(
        client: C,
        selector: ResourceSelector,
        default_template: DynamicObject,
        ui: UiSchema,
        options: SessionOptions,
    ) -> Result<Self> {
        let template_kind = default_template
            .types
            .as_ref()
            .map(|types| types.kind.clone())
            .unwrap_or_default();
        ensure!(
            template_kind == selector.kind,
            TemplateKindMismatchSnafu {
                template: template_kind,
                selector: selector.kind.clone(),
            }
        );

        let template_api_version = default_template
            .types
            .as_ref()
            .map(|types| types.api_version.clone())
            .unwrap_or_default();
        ensure!(
            template_api_version == selector.api_version(),
            TemplateApiVersionMismatchSnafu {
                template: template_api_version,
                selector: selector.api_version(),
            }
        );

        ensure!(
            default_template.metadata.name.as_deref() == Some(selector.name.as_str()),
            TemplateNameMismatchSnafu {
                name: selector.name.clone(),
            }
        );

        Ok(Self {
            client,
            selector,
            default_template,
            ui,
            options,
            schema: None,
            phase: SessionPhase::Loading,
            session: None,
        })
    }

    /// Loads the structural schema and the authoritative resource, then
    /// starts the session: editing the stored resource if the selector
    /// matches one, the default template otherwise.
    pub async fn load(&mut self) -> Result<()> {
        let schema = self
            .client
            .load_schema(&self.selector.gvk())
            .await
            .context(LoadSchemaSnafu {
                kind: self.selector.kind.clone(),
            })?;
        self.schema = Some(schema);

        self.start_session().await
    }

    async fn start_session(&mut self) -> Result<()> {
        let matching = self
            .client
            .fetch_matching(&self.selector)
            .await
            .context(FetchMatchingSnafu {
                kind: self.selector.kind.clone(),
                name: self.selector.name.clone(),
            })?;

        let found = matching.into_iter().find(|resource| {
            resource.metadata.name.as_deref() == Some(self.selector.name.as_str())
        });

        let session = match found {
            Some(live) => {
                debug!(name = %self.selector.name, "editing the existing resource");
                EditSession::start(live, true)?
            }
            None => {
                debug!(
                    name = %self.selector.name,
                    "no stored resource matches, editing the default template"
                );
                EditSession::start(self.seeded_template(), false)?
            }
        };

        self.session = Some(session);
        self.phase = SessionPhase::Ready;
        Ok(())
    }

    // Seeds the template's spec from schema defaults when the template does
    // not bring its own.
    fn seeded_template(&self) -> DynamicObject {
        let mut template = self.default_template.clone();
        if !template.data.is_object() {
            template.data = Value::Object(Map::new());
        }

        if template.data.get("spec").is_none() {
            let defaults = self
                .schema
                .as_ref()
                .and_then(|schema| schema.properties.get("spec"))
                .and_then(StructuralSchema::default_tree);
            if let Some(defaults) = defaults {
                template.data["spec"] = defaults;
            }
        }

        template
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn session(&self) -> Option<&EditSession> {
        self.session.as_ref()
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    /// Whether the authoritative object moved past the token this session is
    /// based on. `false` while no session is active.
    pub fn stale(&self) -> bool {
        self.session.as_ref().is_some_and(EditSession::stale)
    }

    /// Renders the form for one wizard step. An empty path set renders the
    /// full, unfiltered form.
    pub fn render(&self, step: &[FieldPath]) -> Result<RenderedForm> {
        let session = self.ready_session()?;
        let schema = self.schema.as_ref().context(SessionNotReadySnafu)?;

        if step.is_empty() {
            Ok(render::render(schema, &self.ui, &session.edited))
        } else {
            let narrowed = self.ui.restricted_to(step);
            Ok(render::render(schema, &narrowed, &session.edited))
        }
    }

    /// The single mutation entry point: writes one leaf value into the
    /// edited tree, then refreshes the non-editable subtrees from the
    /// authoritative object so the form can never clobber them.
    pub fn apply_change(&mut self, path: &FieldPath, value: Value) -> Result<()> {
        let session = self.ready_session_mut()?;

        path.set_at(&mut session.edited, value);

        let merged = merge_edits_into_live(&session.authoritative, &session.edited)?;
        session.edited = serde_json::to_value(&merged).context(MirrorResourceSnafu)?;
        Ok(())
    }

    /// The edited tree as raw text, for the textual escape hatch.
    pub fn raw_text(&self) -> Result<String> {
        let session = self.ready_session()?;
        raw::to_text(&session.edited, self.options.raw_format).context(RawSerializeSnafu)
    }

    /// Replaces the edited tree from raw text. Input that does not parse
    /// leaves the edited tree untouched.
    pub fn apply_raw_text(&mut self, input: &str) -> Result<()> {
        let format = self.options.raw_format;
        let session = self.ready_session_mut()?;

        let fallback = session.edited.clone();
        let parsed = raw::from_text_or(input, format, fallback);

        let merged = merge_edits_into_live(&session.authoritative, &parsed)?;
        session.edited = serde_json::to_value(&merged).context(MirrorResourceSnafu)?;
        Ok(())
    }

    /// Feeds a watch update into the session. Only the authoritative object
    /// and the staleness flag change; whatever the operator is typing stays
    /// untouched.
    pub fn observe(&mut self, latest: DynamicObject) {
        let Some(session) = &mut self.session else {
            return;
        };

        // Only updates for the resource this session edits are relevant
        if latest.metadata.name.as_deref() != Some(self.selector.name.as_str()) {
            return;
        }
        if latest.metadata.namespace != self.selector.namespace {
            return;
        }

        let incoming = latest.metadata.resource_version.clone();
        let stale = incoming != session.base_token;
        if stale && !session.stale {
            warn!(
                name = %self.selector.name,
                "the resource changed since editing began, edits are based on a stale version"
            );
        }

        session.authoritative = latest;
        session.stale = stale;
    }

    /// Discards all in-progress edits unconditionally and rebases the
    /// session on the newest stored resource.
    pub async fn reload(&mut self) -> Result<()> {
        debug!(name = %self.selector.name, "discarding in-progress edits and rebasing");
        self.start_session().await
    }

    /// Ends the session, discarding the edited tree. A later [`Self::load`]
    /// starts over.
    pub fn cancel(&mut self) {
        self.session = None;
        self.phase = SessionPhase::Loading;
    }

    /// Prunes the edited tree, merges it into the live object and hands the
    /// result to the collaborator: create for new resources, update
    /// otherwise, delete when `is_delete` is set.
    ///
    /// On an update the merged object carries the *latest* fetched
    /// concurrency token: a submit issued after the staleness flag was
    /// surfaced is deliberate last-writer-wins.
    pub async fn submit(&mut self, is_delete: bool) -> Result<SubmitOutcome> {
        match self.phase {
            SessionPhase::Ready => {}
            SessionPhase::Submitting => return SubmissionInFlightSnafu.fail(),
            SessionPhase::Loading => return SessionNotReadySnafu.fail(),
        }

        if self.options.gate_on_validation && !is_delete {
            let form = self.render(&[])?;
            if !form.issues.is_empty() {
                let session = self.ready_session_mut()?;
                session.errors.push(format!(
                    "submission blocked by {} validation finding(s)",
                    form.issues.len()
                ));
                return Ok(SubmitOutcome::Rejected);
            }
        }

        // Everything fallible short of the network call happens before the
        // phase moves, so the session always returns to Ready
        let (resource, is_update) = {
            let session = self.ready_session()?;
            let pruned = prune::prune(&session.edited);
            let mut merged = merge_edits_into_live(&session.authoritative, &pruned)?;
            if session.is_update {
                merged.metadata.resource_version =
                    session.authoritative.metadata.resource_version.clone();
            }
            (merged, session.is_update)
        };

        self.phase = SessionPhase::Submitting;
        let outcome = if is_delete {
            self.client
                .delete(&resource)
                .await
                .map(|()| SubmitOutcome::Deleted)
        } else if is_update {
            self.client.update(&resource).await.map(SubmitOutcome::Applied)
        } else {
            self.client.create(&resource).await.map(SubmitOutcome::Applied)
        };
        self.phase = SessionPhase::Ready;

        match outcome {
            Ok(SubmitOutcome::Applied(applied)) => {
                debug!(name = %self.selector.name, "submission applied, rebasing on the returned object");
                self.session = Some(EditSession::start(applied.clone(), true)?);
                Ok(SubmitOutcome::Applied(applied))
            }
            Ok(outcome) => {
                // Deleted: the session is over
                self.session = None;
                self.phase = SessionPhase::Loading;
                Ok(outcome)
            }
            Err(error) => {
                warn!(
                    name = %self.selector.name,
                    %error,
                    "submission failed, the session stays editable"
                );
                let session = self.ready_session_mut()?;
                session.errors.push(error.to_string());
                Ok(SubmitOutcome::Rejected)
            }
        }
    }

    fn ready_session(&self) -> Result<&EditSession> {
        self.session.as_ref().context(SessionNotReadySnafu)
    }

    fn ready_session_mut(&mut self) -> Result<&mut EditSession> {
        self.session.as_mut().context(SessionNotReadySnafu)
    }
}
