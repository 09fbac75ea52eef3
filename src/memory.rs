use crate::error::{FilmorateError, Result};
use crate::model::*;
use crate::storage::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
struct FilmRow {
    name: String,
    description: String,
    release_date: chrono::NaiveDate,
    duration: u32,
    mpa: RatingId,
}

#[derive(Debug, Default)]
struct Tables {
    films: BTreeMap<FilmId, FilmRow>,
    users: BTreeMap<UserId, UserDraft>,
    genres: BTreeMap<GenreId, String>,
    ratings: BTreeMap<RatingId, String>,
    film_genre: BTreeSet<(FilmId, GenreId)>,
    user_likes: BTreeSet<(FilmId, UserId)>,
    friends: BTreeMap<(UserId, UserId), FriendshipStatus>,
    last_film_id: FilmId,
    last_user_id: UserId,
}

impl Tables {
    fn film(&self, id: FilmId) -> Option<Film> {
        let row = self.films.get(&id)?;
        let mpa = Rating {
            id: row.mpa,
            name: self.ratings.get(&row.mpa).cloned().unwrap_or_default(),
        };
        let genres = self
            .film_genre
            .range((id, GenreId::MIN)..=(id, GenreId::MAX))
            .filter_map(|(_, genre_id)| {
                self.genres.get(genre_id).map(|name| Genre {
                    id: *genre_id,
                    name: name.clone(),
                })
            })
            .collect();
        let likes = self
            .user_likes
            .range((id, UserId::MIN)..=(id, UserId::MAX))
            .map(|(_, user_id)| *user_id)
            .collect();
        Some(Film {
            id,
            name: row.name.clone(),
            description: row.description.clone(),
            release_date: row.release_date,
            duration: row.duration,
            mpa,
            genres,
            likes,
        })
    }

    fn user(&self, id: UserId) -> Option<User> {
        let row = self.users.get(&id)?;
        Some(User {
            id,
            email: row.email.clone(),
            login: row.login.clone(),
            name: row.name.clone(),
            birthday: row.birthday,
            friends: self.friend_ids(id),
        })
    }

    fn friend_ids(&self, id: UserId) -> BTreeSet<UserId> {
        self.friends
            .range((id, UserId::MIN)..=(id, UserId::MAX))
            .filter(|(_, status)| **status == FriendshipStatus::Confirmed)
            .map(|((_, friend_id), _)| *friend_id)
            .collect()
    }

    fn put_film(&mut self, id: FilmId, film: &FilmDraft) {
        self.films.insert(
            id,
            FilmRow {
                name: film.name.clone(),
                description: film.description.clone(),
                release_date: film.release_date,
                duration: film.duration,
                mpa: film.mpa,
            },
        );
        self.film_genre.retain(|(film_id, _)| *film_id != id);
        self.film_genre
            .extend(film.genres.iter().map(|genre_id| (id, *genre_id)));
    }
}

/// Storage kept in process memory. All tables sit behind one lock, so every
/// call is atomic.
#[derive(Debug)]
pub struct MemoryStorage {
    tables: Mutex<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        let tables = Tables {
            genres: GENRES
                .iter()
                .map(|(id, name)| (*id, (*name).to_owned()))
                .collect(),
            ratings: RATINGS
                .iter()
                .map(|(id, name)| (*id, (*name).to_owned()))
                .collect(),
            ..Tables::default()
        };
        MemoryStorage {
            tables: Mutex::new(tables),
        }
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        // No mutation of the tables can panic halfway.
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        MemoryStorage::new()
    }
}

impl FilmStorage for MemoryStorage {
    fn all_films(&self) -> Result<Vec<Film>> {
        let tables = self.tables();
        Ok(tables
            .films
            .keys()
            .filter_map(|id| tables.film(*id))
            .collect())
    }

    fn create_film(&self, film: &FilmDraft) -> Result<Film> {
        let mut tables = self.tables();
        tables.last_film_id += 1;
        let id = tables.last_film_id;
        tables.put_film(id, film);
        tables
            .film(id)
            .ok_or_else(|| FilmorateError::not_found("Film was not stored"))
    }

    fn update_film(&self, id: FilmId, film: &FilmDraft) -> Result<Option<Film>> {
        let mut tables = self.tables();
        if !tables.films.contains_key(&id) {
            return Ok(None);
        }
        tables.put_film(id, film);
        Ok(tables.film(id))
    }

    fn delete_film(&self, id: FilmId) -> Result<bool> {
        let mut tables = self.tables();
        if tables.films.remove(&id).is_none() {
            return Ok(false);
        }
        tables.film_genre.retain(|(film_id, _)| *film_id != id);
        tables.user_likes.retain(|(film_id, _)| *film_id != id);
        Ok(true)
    }

    fn find_film_by_id(&self, id: FilmId) -> Result<Option<Film>> {
        Ok(self.tables().film(id))
    }

    fn add_like(&self, film_id: FilmId, user_id: UserId) -> Result<()> {
        let mut tables = self.tables();
        if !tables.films.contains_key(&film_id) {
            return Err(FilmorateError::not_found(format!("Film {} not found", film_id)));
        }
        tables.user_likes.insert((film_id, user_id));
        Ok(())
    }

    fn delete_like(&self, film_id: FilmId, user_id: UserId) -> Result<()> {
        self.tables().user_likes.remove(&(film_id, user_id));
        Ok(())
    }

    fn show_most_liked_films(&self, count: usize) -> Result<Vec<Film>> {
        Ok(rank_by_likes(self.all_films()?, count))
    }
}

impl UserStorage for MemoryStorage {
    fn all_users(&self) -> Result<Vec<User>> {
        let tables = self.tables();
        Ok(tables
            .users
            .keys()
            .filter_map(|id| tables.user(*id))
            .collect())
    }

    fn create_user(&self, user: &UserDraft) -> Result<User> {
        let mut tables = self.tables();
        tables.last_user_id += 1;
        let id = tables.last_user_id;
        tables.users.insert(id, user.clone());
        tables
            .user(id)
            .ok_or_else(|| FilmorateError::not_found("User was not stored"))
    }

    fn update_user(&self, id: UserId, user: &UserDraft) -> Result<Option<User>> {
        let mut tables = self.tables();
        match tables.users.get_mut(&id) {
            Some(row) => *row = user.clone(),
            None => return Ok(None),
        }
        Ok(tables.user(id))
    }

    fn find_user_by_id(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.tables().user(id))
    }

    fn friendship(
        &self,
        user_id: UserId,
        friend_id: UserId,
    ) -> Result<Option<FriendshipStatus>> {
        Ok(self.tables().friends.get(&(user_id, friend_id)).copied())
    }

    fn apply_friend_edges(&self, edges: &[FriendEdge]) -> Result<()> {
        let mut tables = self.tables();
        for edge in edges {
            let key = (edge.user_id, edge.friend_id);
            match edge.status {
                Some(status) => tables.friends.insert(key, status),
                None => tables.friends.remove(&key),
            };
        }
        Ok(())
    }

    fn friend_ids(&self, user_id: UserId) -> Result<BTreeSet<UserId>> {
        Ok(self.tables().friend_ids(user_id))
    }
}

impl GenreStorage for MemoryStorage {
    fn all_genres(&self) -> Result<Vec<Genre>> {
        Ok(self
            .tables()
            .genres
            .iter()
            .map(|(id, name)| Genre {
                id: *id,
                name: name.clone(),
            })
            .collect())
    }

    fn find_genre_by_id(&self, id: GenreId) -> Result<Option<Genre>> {
        Ok(self.tables().genres.get(&id).map(|name| Genre {
            id,
            name: name.clone(),
        }))
    }
}

impl RatingStorage for MemoryStorage {
    fn all_ratings(&self) -> Result<Vec<Rating>> {
        Ok(self
            .tables()
            .ratings
            .iter()
            .map(|(id, name)| Rating {
                id: *id,
                name: name.clone(),
            })
            .collect())
    }

    fn find_rating_by_id(&self, id: RatingId) -> Result<Option<Rating>> {
        Ok(self.tables().ratings.get(&id).map(|name| Rating {
            id,
            name: name.clone(),
        }))
    }
}
