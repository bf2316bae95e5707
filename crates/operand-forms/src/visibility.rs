//! Deriving a per-step presentation schema from the master one.
//!
//! A wizard shows one slice of the resource per step. Instead of authoring a
//! presentation schema per step, one master schema is narrowed to a set of
//! "keep visible" paths: everything is hidden first, then each path restores
//! its subtree. The author-supplied directives are parked in each node's
//! `shadow` while hidden, so narrowing the same master schema repeatedly
//! never loses widget intent.

use crate::{
    path::FieldPath,
    ui::{UiSchema, Widget},
};

impl UiSchema {
    /// Returns a copy of this presentation schema in which only the given
    /// paths (and their subtrees) are visible.
    ///
    /// Paths are cumulative: each one only adds visibility. Every ancestor of
    /// a visible path has its `flat` designation restored so containers along
    /// the way are never collapsed away; since every path starts at the root,
    /// the root's own directives are restored by any non-empty path set. A
    /// path segment that names no child is silently ignored, which keeps step
    /// definitions decoupled from schema completeness.
    pub fn restricted_to(&self, visible: &[FieldPath]) -> UiSchema {
        let mut narrowed = self.clone();
        narrowed.hide_all();
        for path in visible {
            narrowed.reveal(path.segments());
        }
        narrowed
    }

    fn hide_all(&mut self) {
        // A node that is already hiding a parked directive keeps it; parking
        // again would overwrite author intent with the hidden state
        if self.shadow.is_none() {
            self.shadow = Some(self.directive.clone());
        }
        self.directive.widget = Some(Widget::Hidden);
        self.directive.flat = false;

        for child in self.children.values_mut() {
            child.hide_all();
        }
    }

    fn reveal(&mut self, segments: &[String]) {
        // Containers on the way to a visible field must not be collapsed away
        if let Some(shadow) = &self.shadow {
            self.directive.flat = shadow.flat;
        }

        match segments.split_first() {
            None => self.reveal_subtree(),
            Some((head, rest)) => {
                if let Some(child) = self.children.get_mut(head.as_str()) {
                    child.reveal(rest);
                }
            }
        }
    }

    fn reveal_subtree(&mut self) {
        if let Some(shadow) = &self.shadow {
            self.directive.widget = shadow.widget;
            self.directive.flat = shadow.flat;
        }

        for child in self.children.values_mut() {
            child.reveal_subtree();
        }
    }
}
