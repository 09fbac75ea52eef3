use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type FilmId = u64;
pub type UserId = u64;
pub type GenreId = u32;
pub type RatingId = u32;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Genre {
    pub id: GenreId,
    pub name: String,
}

/// MPA content rating.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Rating {
    pub id: RatingId,
    pub name: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Film {
    pub id: FilmId,
    pub name: String,
    pub description: String,
    pub release_date: NaiveDate,
    pub duration: u32,
    pub mpa: Rating,
    pub genres: Vec<Genre>,
    pub likes: BTreeSet<UserId>,
}

impl PartialEq for Film {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Film {}

#[derive(Serialize, Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub login: String,
    pub name: String,
    pub birthday: NaiveDate,
    pub friends: BTreeSet<UserId>,
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for User {}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FriendshipStatus {
    Pending,
    Confirmed,
}

/// Validated film fields, as handed to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilmDraft {
    pub name: String,
    pub description: String,
    pub release_date: NaiveDate,
    pub duration: u32,
    pub mpa: RatingId,
    pub genres: BTreeSet<GenreId>,
}

/// Validated user fields, name already defaulted to the login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDraft {
    pub email: String,
    pub login: String,
    pub name: String,
    pub birthday: NaiveDate,
}

/// One write to the friendship relation. `status: None` removes the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FriendEdge {
    pub user_id: UserId,
    pub friend_id: UserId,
    pub status: Option<FriendshipStatus>,
}

impl FriendEdge {
    pub fn set(user_id: UserId, friend_id: UserId, status: FriendshipStatus) -> Self {
        FriendEdge {
            user_id,
            friend_id,
            status: Some(status),
        }
    }

    pub fn remove(user_id: UserId, friend_id: UserId) -> Self {
        FriendEdge {
            user_id,
            friend_id,
            status: None,
        }
    }
}
