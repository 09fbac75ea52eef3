use crate::error::{FilmorateError, Result};
use crate::model::*;
use crate::storage::*;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sled::transaction::{
    ConflictableTransactionError, TransactionError, Transactional, TransactionalTree,
};
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::path::Path;

// Keys are big-endian so that tree order is id order.
fn serialize_id(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn deserialize_id<V: AsRef<[u8]>>(id: V) -> sled::Result<u64> {
    id.as_ref()
        .try_into()
        .map(u64::from_be_bytes)
        .map_err(|_| sled::Error::Unsupported(format!("Bad id key: {:?}", id.as_ref())))
}

fn serialize_lookup_id(id: u32) -> [u8; 4] {
    id.to_be_bytes()
}

fn deserialize_lookup_id<V: AsRef<[u8]>>(id: V) -> sled::Result<u32> {
    id.as_ref()
        .try_into()
        .map(u32::from_be_bytes)
        .map_err(|_| sled::Error::Unsupported(format!("Bad lookup key: {:?}", id.as_ref())))
}

fn pair_key(first: u64, second: u64) -> Vec<u8> {
    let mut key = serialize_id(first).to_vec();
    key.extend_from_slice(&serialize_id(second));
    key
}

fn film_genre_key(film_id: FilmId, genre_id: GenreId) -> Vec<u8> {
    let mut key = serialize_id(film_id).to_vec();
    key.extend_from_slice(&serialize_lookup_id(genre_id));
    key
}

fn storage_error(err: TransactionError<Infallible>) -> FilmorateError {
    match err {
        TransactionError::Storage(e) => e.into(),
        TransactionError::Abort(never) => match never {},
    }
}

type TxResult<T> = std::result::Result<T, ConflictableTransactionError<Infallible>>;

const FILMS: &[u8] = b"films";
const USERS: &[u8] = b"users";
const GENRE: &[u8] = b"genre";
const MPA: &[u8] = b"MPA";
const FILM_GENRE: &[u8] = b"film_genre";
const USER_LIKES: &[u8] = b"user_likes";
const FRIENDS: &[u8] = b"friends";
const SEQUENCES: &[u8] = b"sequences";

#[derive(Serialize, Deserialize, Debug)]
struct FilmRecord {
    name: String,
    description: String,
    release_date: NaiveDate,
    duration: u32,
    mpa: RatingId,
}

impl From<&FilmDraft> for FilmRecord {
    fn from(film: &FilmDraft) -> Self {
        FilmRecord {
            name: film.name.clone(),
            description: film.description.clone(),
            release_date: film.release_date,
            duration: film.duration,
            mpa: film.mpa,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
struct UserRecord {
    email: String,
    login: String,
    name: String,
    birthday: NaiveDate,
}

impl From<&UserDraft> for UserRecord {
    fn from(user: &UserDraft) -> Self {
        UserRecord {
            email: user.email.clone(),
            login: user.login.clone(),
            name: user.name.clone(),
            birthday: user.birthday,
        }
    }
}

/// Opens the sled database at `path`, or a temporary one, and seeds the
/// genre and MPA lookup trees.
pub fn open_database(path: Option<&Path>) -> Result<sled::Db> {
    let config = match path {
        Some(path) => sled::Config::new().path(path),
        None => sled::Config::new().temporary(true),
    };
    let db = config.open()?;
    let genres = db.open_tree(GENRE)?;
    for (id, name) in GENRES {
        genres.insert(&serialize_lookup_id(*id)[..], bincode::serialize(name)?)?;
    }
    let ratings = db.open_tree(MPA)?;
    for (id, name) in RATINGS {
        ratings.insert(&serialize_lookup_id(*id)[..], bincode::serialize(name)?)?;
    }
    Ok(db)
}

/// Monotonic per-entity counter, starting at 1.
fn next_id(db: &sled::Db, sequence: &[u8]) -> Result<u64> {
    let sequences = db.open_tree(SEQUENCES)?;
    loop {
        let old = sequences.get(sequence)?;
        let last = match &old {
            Some(bytes) => deserialize_id(bytes)?,
            None => 0,
        };
        let next = serialize_id(last + 1);
        if sequences
            .compare_and_swap(sequence, old, Some(&next[..]))?
            .is_ok()
        {
            return Ok(last + 1);
        }
    }
}

fn lookup_name(tree: &sled::Tree, id: u32) -> Result<Option<String>> {
    match tree.get(serialize_lookup_id(id))? {
        Some(data) => Ok(Some(bincode::deserialize(&data)?)),
        None => Ok(None),
    }
}

/// Second halves of all pair keys starting with `id`.
fn suffix_ids(tree: &sled::Tree, id: u64) -> Result<BTreeSet<u64>> {
    let mut ids = BTreeSet::new();
    for entry in tree.scan_prefix(serialize_id(id)) {
        let (key, _) = entry?;
        ids.insert(deserialize_id(&key[8..])?);
    }
    Ok(ids)
}

fn prefix_keys(tree: &sled::Tree, id: u64) -> Result<Vec<sled::IVec>> {
    tree.scan_prefix(serialize_id(id))
        .keys()
        .collect::<sled::Result<Vec<_>>>()
        .map_err(Into::into)
}

fn load_film(db: &sled::Db, id: FilmId, record: FilmRecord) -> Result<Film> {
    let genre_names = db.open_tree(GENRE)?;
    let mpa = Rating {
        id: record.mpa,
        name: lookup_name(&db.open_tree(MPA)?, record.mpa)?.unwrap_or_default(),
    };
    let mut genres = Vec::new();
    for key in prefix_keys(&db.open_tree(FILM_GENRE)?, id)? {
        let genre_id = deserialize_lookup_id(&key[8..])?;
        if let Some(name) = lookup_name(&genre_names, genre_id)? {
            genres.push(Genre { id: genre_id, name });
        }
    }
    Ok(Film {
        id,
        name: record.name,
        description: record.description,
        release_date: record.release_date,
        duration: record.duration,
        mpa,
        genres,
        likes: suffix_ids(&db.open_tree(USER_LIKES)?, id)?,
    })
}

fn load_user(db: &sled::Db, id: UserId, record: UserRecord) -> Result<User> {
    Ok(User {
        id,
        email: record.email,
        login: record.login,
        name: record.name,
        birthday: record.birthday,
        friends: db.friend_ids(id)?,
    })
}

/// Writes the film row and replaces its genre rows in one transaction. With
/// `replace` set, nothing is written unless the film row already exists.
fn write_film(db: &sled::Db, id: FilmId, film: &FilmDraft, replace: bool) -> Result<bool> {
    let films = db.open_tree(FILMS)?;
    let film_genre = db.open_tree(FILM_GENRE)?;
    let record = bincode::serialize(&FilmRecord::from(film))?;
    (&films, &film_genre)
        .transaction(|(films, film_genre)| -> TxResult<bool> {
            if replace && films.get(serialize_id(id))?.is_none() {
                return Ok(false);
            }
            films.insert(&serialize_id(id)[..], record.as_slice())?;
            clear_genres(film_genre, id)?;
            for genre_id in &film.genres {
                film_genre.insert(film_genre_key(id, *genre_id), Vec::<u8>::new())?;
            }
            Ok(true)
        })
        .map_err(storage_error)
}

// Genre rows only ever reference seeded genres.
fn clear_genres(film_genre: &TransactionalTree, id: FilmId) -> TxResult<()> {
    for (genre_id, _) in GENRES {
        film_genre.remove(film_genre_key(id, *genre_id))?;
    }
    Ok(())
}

impl FilmStorage for sled::Db {
    fn all_films(&self) -> Result<Vec<Film>> {
        let mut films = Vec::new();
        for entry in self.open_tree(FILMS)?.iter() {
            let (key, data) = entry?;
            films.push(load_film(self, deserialize_id(key)?, bincode::deserialize(&data)?)?);
        }
        Ok(films)
    }

    fn create_film(&self, film: &FilmDraft) -> Result<Film> {
        let id = next_id(self, FILMS)?;
        write_film(self, id, film, false)?;
        load_film(self, id, FilmRecord::from(film))
    }

    fn update_film(&self, id: FilmId, film: &FilmDraft) -> Result<Option<Film>> {
        if !write_film(self, id, film, true)? {
            return Ok(None);
        }
        Ok(Some(load_film(self, id, FilmRecord::from(film))?))
    }

    fn delete_film(&self, id: FilmId) -> Result<bool> {
        let films = self.open_tree(FILMS)?;
        let film_genre = self.open_tree(FILM_GENRE)?;
        let user_likes = self.open_tree(USER_LIKES)?;
        let like_keys = prefix_keys(&user_likes, id)?;
        let removed = (&films, &film_genre, &user_likes)
            .transaction(|(films, film_genre, user_likes)| -> TxResult<bool> {
                let removed = films.remove(&serialize_id(id)[..])?;
                clear_genres(film_genre, id)?;
                for key in &like_keys {
                    user_likes.remove(key.clone())?;
                }
                Ok(removed.is_some())
            })
            .map_err(storage_error)?;
        // Likes committed after the scan. New ones are refused once the film
        // row is gone.
        for key in prefix_keys(&user_likes, id)? {
            user_likes.remove(key)?;
        }
        Ok(removed)
    }

    fn find_film_by_id(&self, id: FilmId) -> Result<Option<Film>> {
        match self.open_tree(FILMS)?.get(serialize_id(id))? {
            Some(data) => Ok(Some(load_film(self, id, bincode::deserialize(&data)?)?)),
            None => Ok(None),
        }
    }

    fn add_like(&self, film_id: FilmId, user_id: UserId) -> Result<()> {
        let films = self.open_tree(FILMS)?;
        let user_likes = self.open_tree(USER_LIKES)?;
        let added = (&films, &user_likes)
            .transaction(|(films, user_likes)| -> TxResult<bool> {
                if films.get(serialize_id(film_id))?.is_none() {
                    return Ok(false);
                }
                user_likes.insert(pair_key(film_id, user_id), Vec::<u8>::new())?;
                Ok(true)
            })
            .map_err(storage_error)?;
        if !added {
            return Err(FilmorateError::not_found(format!("Film {} not found", film_id)));
        }
        Ok(())
    }

    fn delete_like(&self, film_id: FilmId, user_id: UserId) -> Result<()> {
        self.open_tree(USER_LIKES)?
            .remove(pair_key(film_id, user_id))?;
        Ok(())
    }

    fn show_most_liked_films(&self, count: usize) -> Result<Vec<Film>> {
        Ok(rank_by_likes(self.all_films()?, count))
    }
}

impl UserStorage for sled::Db {
    fn all_users(&self) -> Result<Vec<User>> {
        let mut users = Vec::new();
        for entry in self.open_tree(USERS)?.iter() {
            let (key, data) = entry?;
            users.push(load_user(self, deserialize_id(key)?, bincode::deserialize(&data)?)?);
        }
        Ok(users)
    }

    fn create_user(&self, user: &UserDraft) -> Result<User> {
        let id = next_id(self, USERS)?;
        self.open_tree(USERS)?.insert(
            &serialize_id(id)[..],
            bincode::serialize(&UserRecord::from(user))?,
        )?;
        load_user(self, id, UserRecord::from(user))
    }

    fn update_user(&self, id: UserId, user: &UserDraft) -> Result<Option<User>> {
        let users = self.open_tree(USERS)?;
        if !users.contains_key(serialize_id(id))? {
            return Ok(None);
        }
        users.insert(
            &serialize_id(id)[..],
            bincode::serialize(&UserRecord::from(user))?,
        )?;
        Ok(Some(load_user(self, id, UserRecord::from(user))?))
    }

    fn find_user_by_id(&self, id: UserId) -> Result<Option<User>> {
        match self.open_tree(USERS)?.get(serialize_id(id))? {
            Some(data) => Ok(Some(load_user(self, id, bincode::deserialize(&data)?)?)),
            None => Ok(None),
        }
    }

    fn friendship(
        &self,
        user_id: UserId,
        friend_id: UserId,
    ) -> Result<Option<FriendshipStatus>> {
        match self.open_tree(FRIENDS)?.get(pair_key(user_id, friend_id))? {
            Some(data) => Ok(Some(bincode::deserialize(&data)?)),
            None => Ok(None),
        }
    }

    fn apply_friend_edges(&self, edges: &[FriendEdge]) -> Result<()> {
        let writes = edges
            .iter()
            .map(|edge| -> Result<(Vec<u8>, Option<Vec<u8>>)> {
                let value = edge.status.map(|status| bincode::serialize(&status)).transpose()?;
                Ok((pair_key(edge.user_id, edge.friend_id), value))
            })
            .collect::<Result<Vec<_>>>()?;
        self.open_tree(FRIENDS)?
            .transaction(|friends| -> TxResult<()> {
                for (key, value) in &writes {
                    match value {
                        Some(value) => friends.insert(key.as_slice(), value.as_slice())?,
                        None => friends.remove(key.as_slice())?,
                    };
                }
                Ok(())
            })
            .map_err(storage_error)
    }

    fn friend_ids(&self, user_id: UserId) -> Result<BTreeSet<UserId>> {
        let mut ids = BTreeSet::new();
        for entry in self.open_tree(FRIENDS)?.scan_prefix(serialize_id(user_id)) {
            let (key, data) = entry?;
            let status: FriendshipStatus = bincode::deserialize(&data)?;
            if status == FriendshipStatus::Confirmed {
                ids.insert(deserialize_id(&key[8..])?);
            }
        }
        Ok(ids)
    }
}

impl GenreStorage for sled::Db {
    fn all_genres(&self) -> Result<Vec<Genre>> {
        let mut genres = Vec::new();
        for entry in self.open_tree(GENRE)?.iter() {
            let (key, data) = entry?;
            genres.push(Genre {
                id: deserialize_lookup_id(key)?,
                name: bincode::deserialize(&data)?,
            });
        }
        Ok(genres)
    }

    fn find_genre_by_id(&self, id: GenreId) -> Result<Option<Genre>> {
        Ok(lookup_name(&self.open_tree(GENRE)?, id)?.map(|name| Genre { id, name }))
    }
}

impl RatingStorage for sled::Db {
    fn all_ratings(&self) -> Result<Vec<Rating>> {
        let mut ratings = Vec::new();
        for entry in self.open_tree(MPA)?.iter() {
            let (key, data) = entry?;
            ratings.push(Rating {
                id: deserialize_lookup_id(key)?,
                name: bincode::deserialize(&data)?,
            });
        }
        Ok(ratings)
    }

    fn find_rating_by_id(&self, id: RatingId) -> Result<Option<Rating>> {
        Ok(lookup_name(&self.open_tree(MPA)?, id)?.map(|name| Rating { id, name }))
    }
}
