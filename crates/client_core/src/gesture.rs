//! Translation of user gestures into a new full ordering.

use crate::error::GestureError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    /// Drag-and-drop. `destination` is an index into the list with the dragged
    /// item already removed.
    Drop { source: usize, destination: usize },
    MoveUp { index: usize },
    MoveDown { index: usize },
}

impl Gesture {
    /// Returns the reordered sequence, or `None` when the gesture changes nothing.
    pub fn apply<T: Clone>(&self, order: &[T]) -> Result<Option<Vec<T>>, GestureError> {
        let len = order.len();
        match *self {
            Gesture::Drop {
                source,
                destination,
            } => {
                check_index(source, len)?;
                check_index(destination, len)?;
                if source == destination {
                    return Ok(None);
                }
                let mut next = order.to_vec();
                let moved = next.remove(source);
                next.insert(destination, moved);
                Ok(Some(next))
            }
            Gesture::MoveUp { index } => {
                check_index(index, len)?;
                if index == 0 {
                    return Ok(None);
                }
                let mut next = order.to_vec();
                next.swap(index, index - 1);
                Ok(Some(next))
            }
            Gesture::MoveDown { index } => {
                check_index(index, len)?;
                if index + 1 == len {
                    return Ok(None);
                }
                let mut next = order.to_vec();
                next.swap(index, index + 1);
                Ok(Some(next))
            }
        }
    }
}

fn check_index(index: usize, len: usize) -> Result<(), GestureError> {
    if index < len {
        Ok(())
    } else {
        Err(GestureError::OutOfRange { index, len })
    }
}
