use crate::error::{FilmorateError, Result};
use crate::model::*;
use crate::storage::Storage;
use crate::validation::{FilmBody, UserBody};
use chrono::{Local, NaiveDate};
use log::{info, warn};
use std::sync::Arc;

/// How `add_friend` and `delete_friend` write the friendship relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FriendshipMode {
    /// Both directions are written and removed together.
    Symmetric,
    /// A single confirmed edge, no request step.
    #[default]
    Direct,
    /// A pending request that becomes mutual once the other side adds back.
    Confirmation,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[derive(Clone)]
pub struct UserService {
    storage: Arc<dyn Storage>,
    mode: FriendshipMode,
}

impl UserService {
    pub fn new(storage: Arc<dyn Storage>, mode: FriendshipMode) -> Self {
        UserService { storage, mode }
    }

    pub fn create_user(&self, body: &UserBody) -> Result<User> {
        let draft = body.validate(today())?;
        let user = self.storage.create_user(&draft)?;
        info!("Created user {} ({})", user.id, user.login);
        Ok(user)
    }

    pub fn update_user(&self, body: &UserBody) -> Result<User> {
        let id = match body.id {
            Some(id) => id,
            None => {
                warn!("User update without id");
                return Err(FilmorateError::validation("User id must be set"));
            }
        };
        let draft = body.validate(today())?;
        let user = self
            .storage
            .update_user(id, &draft)?
            .ok_or_else(|| user_not_found(id))?;
        info!("Updated user {} ({})", user.id, user.login);
        Ok(user)
    }

    pub fn all_users(&self) -> Result<Vec<User>> {
        self.storage.all_users()
    }

    pub fn find_user_by_id(&self, id: UserId) -> Result<User> {
        self.check_user(id)
    }

    pub fn add_friend(&self, user_id: UserId, friend_id: UserId) -> Result<()> {
        if user_id == friend_id {
            return Err(FilmorateError::validation("A user cannot befriend themselves"));
        }
        let user = self.check_user(user_id)?;
        let friend = self.check_user(friend_id)?;
        let existing = self.storage.friendship(user_id, friend_id)?;
        match self.mode {
            FriendshipMode::Symmetric => {
                if existing.is_some() {
                    return Err(FilmorateError::validation(format!(
                        "Users {} and {} are already friends",
                        user_id, friend_id
                    )));
                }
                self.storage.apply_friend_edges(&[
                    FriendEdge::set(user_id, friend_id, FriendshipStatus::Confirmed),
                    FriendEdge::set(friend_id, user_id, FriendshipStatus::Confirmed),
                ])?;
            }
            FriendshipMode::Direct => {
                self.storage
                    .add_friend(user_id, friend_id, FriendshipStatus::Confirmed)?;
            }
            FriendshipMode::Confirmation => {
                if existing.is_some() {
                    return Err(FilmorateError::validation(format!(
                        "User {} already asked {} to be friends",
                        user_id, friend_id
                    )));
                }
                if self.storage.friendship(friend_id, user_id)?.is_some() {
                    self.storage.apply_friend_edges(&[
                        FriendEdge::set(user_id, friend_id, FriendshipStatus::Confirmed),
                        FriendEdge::set(friend_id, user_id, FriendshipStatus::Confirmed),
                    ])?;
                } else {
                    self.storage
                        .add_friend(user_id, friend_id, FriendshipStatus::Pending)?;
                    info!(
                        "User {} sent a friend request to {}",
                        user.login, friend.login
                    );
                    return Ok(());
                }
            }
        }
        info!("Users {} and {} are now friends", user.login, friend.login);
        Ok(())
    }

    pub fn delete_friend(&self, user_id: UserId, friend_id: UserId) -> Result<()> {
        if user_id == friend_id {
            return Err(FilmorateError::validation("A user cannot unfriend themselves"));
        }
        let user = self.check_user(user_id)?;
        let friend = self.check_user(friend_id)?;
        match self.mode {
            FriendshipMode::Symmetric => self.storage.apply_friend_edges(&[
                FriendEdge::remove(user_id, friend_id),
                FriendEdge::remove(friend_id, user_id),
            ])?,
            FriendshipMode::Direct => self.storage.delete_friend(user_id, friend_id)?,
            FriendshipMode::Confirmation => {
                let mut edges = vec![FriendEdge::remove(user_id, friend_id)];
                if self.storage.friendship(friend_id, user_id)?
                    == Some(FriendshipStatus::Confirmed)
                {
                    edges.push(FriendEdge::set(
                        friend_id,
                        user_id,
                        FriendshipStatus::Pending,
                    ));
                }
                self.storage.apply_friend_edges(&edges)?
            }
        }
        info!("Users {} and {} are no longer friends", user.login, friend.login);
        Ok(())
    }

    pub fn show_friends(&self, user_id: UserId) -> Result<Vec<User>> {
        self.check_user(user_id)?;
        self.storage.show_friends(user_id)
    }

    pub fn show_common_friends(&self, user_id: UserId, other_id: UserId) -> Result<Vec<User>> {
        if user_id == other_id {
            return Err(FilmorateError::validation(
                "Common friends need two different users",
            ));
        }
        self.check_user(user_id)?;
        self.check_user(other_id)?;
        self.storage.show_common_friends(user_id, other_id)
    }

    pub(crate) fn check_user(&self, id: UserId) -> Result<User> {
        self.storage
            .find_user_by_id(id)?
            .ok_or_else(|| user_not_found(id))
    }
}

fn user_not_found(id: UserId) -> FilmorateError {
    FilmorateError::not_found(format!("User {} not found", id))
}

fn film_not_found(id: FilmId) -> FilmorateError {
    FilmorateError::not_found(format!("Film {} not found", id))
}

#[derive(Clone)]
pub struct FilmService {
    storage: Arc<dyn Storage>,
    users: UserService,
}

impl FilmService {
    pub fn new(storage: Arc<dyn Storage>, users: UserService) -> Self {
        FilmService { storage, users }
    }

    pub fn create_film(&self, body: &FilmBody) -> Result<Film> {
        let draft = body.validate(today())?;
        self.check_lookups(&draft)?;
        let film = self.storage.create_film(&draft)?;
        info!("Created film {} ({})", film.id, film.name);
        Ok(film)
    }

    pub fn update_film(&self, body: &FilmBody) -> Result<Film> {
        let id = match body.id {
            Some(id) => id,
            None => {
                warn!("Film update without id");
                return Err(FilmorateError::validation("Film id must be set"));
            }
        };
        self.find_film_by_id(id)?;
        let draft = body.validate(today())?;
        self.check_lookups(&draft)?;
        let film = self
            .storage
            .update_film(id, &draft)?
            .ok_or_else(|| film_not_found(id))?;
        info!("Updated film {} ({})", film.id, film.name);
        Ok(film)
    }

    pub fn all_films(&self) -> Result<Vec<Film>> {
        self.storage.all_films()
    }

    pub fn find_film_by_id(&self, id: FilmId) -> Result<Film> {
        self.storage
            .find_film_by_id(id)?
            .ok_or_else(|| film_not_found(id))
    }

    pub fn delete_film(&self, id: FilmId) -> Result<()> {
        if !self.storage.delete_film(id)? {
            return Err(film_not_found(id));
        }
        info!("Deleted film {}", id);
        Ok(())
    }

    pub fn add_like(&self, film_id: FilmId, user_id: UserId) -> Result<()> {
        let user = self.users.check_user(user_id)?;
        let film = self.find_film_by_id(film_id)?;
        if film.likes.contains(&user_id) {
            return Err(FilmorateError::validation(format!(
                "User {} already likes film {}",
                user_id, film_id
            )));
        }
        self.storage.add_like(film_id, user_id)?;
        info!("User {} liked film {}", user.login, film.name);
        Ok(())
    }

    pub fn delete_like(&self, film_id: FilmId, user_id: UserId) -> Result<()> {
        let user = self.users.check_user(user_id)?;
        let film = self.find_film_by_id(film_id)?;
        if !film.likes.contains(&user_id) {
            return Err(FilmorateError::validation(format!(
                "User {} does not like film {}",
                user_id, film_id
            )));
        }
        self.storage.delete_like(film_id, user_id)?;
        info!("User {} no longer likes film {}", user.login, film.name);
        Ok(())
    }

    /// Non-positive counts yield no films.
    pub fn show_most_liked_films(&self, count: i64) -> Result<Vec<Film>> {
        let count = usize::try_from(count.max(0)).unwrap_or(usize::MAX);
        self.storage.show_most_liked_films(count)
    }

    fn check_lookups(&self, draft: &FilmDraft) -> Result<()> {
        for genre_id in &draft.genres {
            if self.storage.find_genre_by_id(*genre_id)?.is_none() {
                return Err(FilmorateError::not_found(format!(
                    "Genre {} not found",
                    genre_id
                )));
            }
        }
        if self.storage.find_rating_by_id(draft.mpa)?.is_none() {
            return Err(FilmorateError::not_found(format!(
                "Rating {} not found",
                draft.mpa
            )));
        }
        Ok(())
    }
}

/// Genres and MPA ratings.
#[derive(Clone)]
pub struct LookupService {
    storage: Arc<dyn Storage>,
}

impl LookupService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        LookupService { storage }
    }

    pub fn all_genres(&self) -> Result<Vec<Genre>> {
        self.storage.all_genres()
    }

    pub fn find_genre_by_id(&self, id: GenreId) -> Result<Genre> {
        self.storage
            .find_genre_by_id(id)?
            .ok_or_else(|| FilmorateError::not_found(format!("Genre {} not found", id)))
    }

    pub fn all_ratings(&self) -> Result<Vec<Rating>> {
        self.storage.all_ratings()
    }

    pub fn find_rating_by_id(&self, id: RatingId) -> Result<Rating> {
        self.storage
            .find_rating_by_id(id)?
            .ok_or_else(|| FilmorateError::not_found(format!("Rating {} not found", id)))
    }
}
