//! Follow edge rules.

/// Outcome of asking to follow an author.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowDecision {
    /// The follower and the author are the same user; nothing is stored.
    SelfFollow,
    /// An edge should exist after the request; an existing one is reused.
    Create,
}

pub fn decide_follow(user_id: i64, author_id: i64) -> FollowDecision {
    if user_id == author_id {
        FollowDecision::SelfFollow
    } else {
        FollowDecision::Create
    }
}
