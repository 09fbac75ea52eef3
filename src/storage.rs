use crate::error::Result;
use crate::model::*;
use std::collections::BTreeSet;

pub const GENRES: &[(GenreId, &str)] = &[
    (1, "Comedy"),
    (2, "Drama"),
    (3, "Cartoon"),
    (4, "Thriller"),
    (5, "Documentary"),
    (6, "Action"),
];

pub const RATINGS: &[(RatingId, &str)] = &[
    (1, "G"),
    (2, "PG"),
    (3, "PG-13"),
    (4, "R"),
    (5, "NC-17"),
];

/// Film persistence. Callers are expected to have checked that referenced
/// users, genres and the rating exist.
pub trait FilmStorage {
    fn all_films(&self) -> Result<Vec<Film>>;
    fn create_film(&self, film: &FilmDraft) -> Result<Film>;
    /// Returns `None` if no film has this id.
    fn update_film(&self, id: FilmId, film: &FilmDraft) -> Result<Option<Film>>;
    /// Returns whether a film was removed.
    fn delete_film(&self, id: FilmId) -> Result<bool>;
    fn find_film_by_id(&self, id: FilmId) -> Result<Option<Film>>;
    /// Fails with `NotFound` if the film is gone.
    fn add_like(&self, film_id: FilmId, user_id: UserId) -> Result<()>;
    fn delete_like(&self, film_id: FilmId, user_id: UserId) -> Result<()>;
    fn show_most_liked_films(&self, count: usize) -> Result<Vec<Film>>;
}

pub trait UserStorage {
    fn all_users(&self) -> Result<Vec<User>>;
    fn create_user(&self, user: &UserDraft) -> Result<User>;
    /// Returns `None` if no user has this id.
    fn update_user(&self, id: UserId, user: &UserDraft) -> Result<Option<User>>;
    fn find_user_by_id(&self, id: UserId) -> Result<Option<User>>;
    fn friendship(&self, user_id: UserId, friend_id: UserId)
        -> Result<Option<FriendshipStatus>>;
    /// Applies all edges or none of them.
    fn apply_friend_edges(&self, edges: &[FriendEdge]) -> Result<()>;
    /// Friend ids over confirmed outgoing edges, ascending.
    fn friend_ids(&self, user_id: UserId) -> Result<BTreeSet<UserId>>;

    fn add_friend(
        &self,
        user_id: UserId,
        friend_id: UserId,
        status: FriendshipStatus,
    ) -> Result<()> {
        self.apply_friend_edges(&[FriendEdge::set(user_id, friend_id, status)])
    }

    fn delete_friend(&self, user_id: UserId, friend_id: UserId) -> Result<()> {
        self.apply_friend_edges(&[FriendEdge::remove(user_id, friend_id)])
    }

    fn show_friends(&self, user_id: UserId) -> Result<Vec<User>> {
        self.users_by_ids(&self.friend_ids(user_id)?)
    }

    fn show_common_friends(&self, user_id: UserId, other_id: UserId) -> Result<Vec<User>> {
        let mine = self.friend_ids(user_id)?;
        let theirs = self.friend_ids(other_id)?;
        let common = mine.intersection(&theirs).copied().collect();
        self.users_by_ids(&common)
    }

    fn users_by_ids(&self, ids: &BTreeSet<UserId>) -> Result<Vec<User>> {
        let mut users = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(user) = self.find_user_by_id(*id)? {
                users.push(user);
            }
        }
        Ok(users)
    }
}

pub trait GenreStorage {
    fn all_genres(&self) -> Result<Vec<Genre>>;
    fn find_genre_by_id(&self, id: GenreId) -> Result<Option<Genre>>;
}

pub trait RatingStorage {
    fn all_ratings(&self) -> Result<Vec<Rating>>;
    fn find_rating_by_id(&self, id: RatingId) -> Result<Option<Rating>>;
}

pub trait Storage: FilmStorage + UserStorage + GenreStorage + RatingStorage + Send + Sync {}

impl<T> Storage for T where T: FilmStorage + UserStorage + GenreStorage + RatingStorage + Send + Sync
{}

/// Orders films by number of likes, most liked first, ties by id, and keeps
/// the first `count`.
pub fn rank_by_likes(mut films: Vec<Film>, count: usize) -> Vec<Film> {
    films.sort_by(|a, b| b.likes.len().cmp(&a.likes.len()).then(a.id.cmp(&b.id)));
    films.truncate(count);
    films
}
