//! Default remote action namespace.
//!
//! These are the action names the application enqueues. Executors may
//! register more; anything unregistered is a permanent failure.

/// Marks an item as a favorite.
pub const ADD_FAVORITE: &str = "addFavorite";
/// Removes an item from the favorites.
pub const REMOVE_FAVORITE: &str = "removeFavorite";
/// Stores a calculation result.
pub const SAVE_CALCULATION: &str = "saveCalculation";
/// Updates a goal.
pub const UPDATE_GOAL: &str = "updateGoal";
/// Deletes a goal.
pub const DELETE_GOAL: &str = "deleteGoal";

/// All default actions.
pub const DEFAULT_ACTIONS: [&str; 5] = [
    ADD_FAVORITE,
    REMOVE_FAVORITE,
    SAVE_CALCULATION,
    UPDATE_GOAL,
    DELETE_GOAL,
];

/// Returns true if `action` belongs to the default namespace.
pub fn is_default_action(action: &str) -> bool {
    DEFAULT_ACTIONS.contains(&action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_namespace() {
        assert!(is_default_action("addFavorite"));
        assert!(is_default_action("deleteGoal"));
        assert!(!is_default_action("updateProfile"));
    }
}
