//! Format editor state machine.
//!
//! ```text
//!            begin_edit (admin)        begin_save (valid)
//!  Viewing ───────────────────▶ Editing ─────────────────▶ Saving
//!     ▲                          │  ▲                         │
//!     │          cancel          │  │ invalid draft /         │
//!     └──────────────────────────┘  │ complete_save(Err)      │
//!     ▲                             └─────────────────────────┤
//!     └───────────────── complete_save(Ok) ───────────────────┘
//! ```
//!
//! The draft is an unvalidated list so the editor can hold work in progress
//! (an element whose kind was just switched, a literal still being typed).
//! Validation happens only on `begin_save`. Concurrent editors are not
//! reconciled; the last successful save wins.

use serde::Serialize;
use thiserror::Error;

use crate::element::RawFormatElement;
use crate::error::FormatError;
use crate::format::IdentifierFormat;
use crate::role::InventoryRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorState {
    Viewing,
    Editing,
    Saving,
}

impl std::fmt::Display for EditorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EditorState::Viewing => "viewing",
            EditorState::Editing => "editing",
            EditorState::Saving => "saving",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EditorError {
    #[error("role '{role}' may not edit the identifier format")]
    Forbidden { role: InventoryRole },

    #[error("cannot {action} while {from}")]
    InvalidTransition {
        from: EditorState,
        action: &'static str,
    },

    #[error("element index {index} out of range for draft of length {len}")]
    OutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Invalid(#[from] FormatError),
}

/// Why the last save attempt left the editor in `Editing`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveFailure {
    Validation(FormatError),
    Persistence(String),
}

#[derive(Debug, Clone)]
pub struct FormatEditor {
    state: EditorState,
    committed: IdentifierFormat,
    draft: Vec<RawFormatElement>,
    last_error: Option<SaveFailure>,
}

impl FormatEditor {
    /// Starts in `Viewing` over the currently persisted format.
    pub fn new(committed: IdentifierFormat) -> Self {
        Self {
            state: EditorState::Viewing,
            committed,
            draft: Vec::new(),
            last_error: None,
        }
    }

    pub fn state(&self) -> EditorState {
        self.state
    }

    pub fn committed(&self) -> &IdentifierFormat {
        &self.committed
    }

    pub fn draft(&self) -> &[RawFormatElement] {
        &self.draft
    }

    pub fn last_error(&self) -> Option<&SaveFailure> {
        self.last_error.as_ref()
    }

    pub fn begin_edit(&mut self, role: InventoryRole) -> Result<(), EditorError> {
        if !role.can_edit_format() {
            return Err(EditorError::Forbidden { role });
        }
        self.expect(EditorState::Viewing, "begin editing")?;
        self.draft = self.committed.to_raw();
        self.last_error = None;
        self.state = EditorState::Editing;
        Ok(())
    }

    /// Discards the draft and returns to `Viewing`.
    pub fn cancel(&mut self) -> Result<(), EditorError> {
        self.expect(EditorState::Editing, "cancel")?;
        self.draft.clear();
        self.last_error = None;
        self.state = EditorState::Viewing;
        Ok(())
    }

    pub fn set_draft(&mut self, elements: Vec<RawFormatElement>) -> Result<(), EditorError> {
        self.expect(EditorState::Editing, "replace the draft")?;
        self.draft = elements;
        Ok(())
    }

    pub fn push(&mut self, element: RawFormatElement) -> Result<(), EditorError> {
        self.expect(EditorState::Editing, "add an element")?;
        self.draft.push(element);
        Ok(())
    }

    pub fn insert(&mut self, index: usize, element: RawFormatElement) -> Result<(), EditorError> {
        self.expect(EditorState::Editing, "insert an element")?;
        if index > self.draft.len() {
            return Err(self.out_of_range(index));
        }
        self.draft.insert(index, element);
        Ok(())
    }

    pub fn replace(&mut self, index: usize, element: RawFormatElement) -> Result<(), EditorError> {
        self.expect(EditorState::Editing, "change an element")?;
        let len = self.draft.len();
        let slot = self
            .draft
            .get_mut(index)
            .ok_or(EditorError::OutOfRange { index, len })?;
        *slot = element;
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<RawFormatElement, EditorError> {
        self.expect(EditorState::Editing, "remove an element")?;
        if index >= self.draft.len() {
            return Err(self.out_of_range(index));
        }
        Ok(self.draft.remove(index))
    }

    /// Splices the element at `from` out and reinserts it at `to`.
    pub fn move_to(&mut self, from: usize, to: usize) -> Result<(), EditorError> {
        self.expect(EditorState::Editing, "reorder elements")?;
        let len = self.draft.len();
        if from >= len {
            return Err(self.out_of_range(from));
        }
        if to >= len {
            return Err(self.out_of_range(to));
        }
        let element = self.draft.remove(from);
        self.draft.insert(to, element);
        Ok(())
    }

    /// No-op at the top of the list.
    pub fn move_up(&mut self, index: usize) -> Result<(), EditorError> {
        if index == 0 {
            self.expect(EditorState::Editing, "reorder elements")?;
            return Ok(());
        }
        self.move_to(index, index - 1)
    }

    /// No-op at the bottom of the list.
    pub fn move_down(&mut self, index: usize) -> Result<(), EditorError> {
        if index.saturating_add(1) == self.draft.len() {
            self.expect(EditorState::Editing, "reorder elements")?;
            return Ok(());
        }
        self.move_to(index, index.saturating_add(1))
    }

    /// Validates the draft. On success the editor enters `Saving` and the
    /// returned format is what the caller must persist. On failure nothing is
    /// applied and the editor stays in `Editing` with the reason recorded.
    pub fn begin_save(&mut self) -> Result<IdentifierFormat, EditorError> {
        self.expect(EditorState::Editing, "save")?;
        match IdentifierFormat::validate(self.draft.clone()) {
            Ok(format) => {
                self.last_error = None;
                self.state = EditorState::Saving;
                Ok(format)
            }
            Err(e) => {
                self.last_error = Some(SaveFailure::Validation(e.clone()));
                Err(EditorError::Invalid(e))
            }
        }
    }

    /// Reports the persistence outcome of a save started with `begin_save`.
    pub fn complete_save(
        &mut self,
        outcome: Result<IdentifierFormat, String>,
    ) -> Result<(), EditorError> {
        self.expect(EditorState::Saving, "complete a save")?;
        match outcome {
            Ok(saved) => {
                self.committed = saved;
                self.draft.clear();
                self.last_error = None;
                self.state = EditorState::Viewing;
            }
            Err(message) => {
                self.last_error = Some(SaveFailure::Persistence(message));
                self.state = EditorState::Editing;
            }
        }
        Ok(())
    }

    fn expect(&self, state: EditorState, action: &'static str) -> Result<(), EditorError> {
        if self.state == state {
            Ok(())
        } else {
            Err(EditorError::InvalidTransition {
                from: self.state,
                action,
            })
        }
    }

    fn out_of_range(&self, index: usize) -> EditorError {
        EditorError::OutOfRange {
            index,
            len: self.draft.len(),
        }
    }
}
