use crate::error::{FilmorateError, Result};
use crate::model::*;
use chrono::NaiveDate;
use lazy_static::lazy_static;
use log::warn;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeSet;

pub const MAX_DESCRIPTION_LENGTH: usize = 200;

/// The first public film screening.
pub fn min_release_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1895, 12, 28).unwrap_or(NaiveDate::MIN)
}

lazy_static! {
    static ref EMAIL: Regex = Regex::new(r"^[^@\s]+@[^@\s]+$").expect("valid email pattern");
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct IdRef<T> {
    pub id: T,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FilmBody {
    pub id: Option<FilmId>,
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub release_date: Option<NaiveDate>,
    #[serde(default)]
    pub duration: i64,
    pub mpa: Option<IdRef<i64>>,
    pub genres: Option<Vec<IdRef<i64>>>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct UserBody {
    pub id: Option<UserId>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub login: String,
    pub name: Option<String>,
    pub birthday: Option<NaiveDate>,
}

fn reject<T>(message: &str) -> Result<T> {
    warn!("Validation failed: {}", message);
    Err(FilmorateError::validation(message))
}

impl FilmBody {
    pub fn validate(&self, today: NaiveDate) -> Result<FilmDraft> {
        if self.name.trim().is_empty() {
            return reject("Film name must not be blank");
        }
        let description = self.description.clone().unwrap_or_default();
        if description.chars().count() > MAX_DESCRIPTION_LENGTH {
            return reject("Film description must be at most 200 characters");
        }
        let release_date = match self.release_date {
            Some(date) => date,
            None => return reject("Film release date must be set"),
        };
        if release_date < min_release_date() {
            return reject("Film release date must not be before 1895-12-28");
        }
        if release_date > today {
            return reject("Film release date must not be in the future");
        }
        if self.duration <= 0 {
            return reject("Film duration must be positive");
        }
        let duration = match u32::try_from(self.duration) {
            Ok(duration) => duration,
            Err(_) => return reject("Film duration is too long"),
        };
        let mpa = match self.mpa {
            Some(mpa) => lookup_id(mpa.id, "Rating")?,
            None => return reject("Film rating must be set"),
        };
        let genres = self
            .genres
            .iter()
            .flatten()
            .map(|genre| lookup_id(genre.id, "Genre"))
            .collect::<Result<BTreeSet<_>>>()?;
        Ok(FilmDraft {
            name: self.name.clone(),
            description,
            release_date,
            duration,
            mpa,
            genres,
        })
    }
}

// Lookup ids outside the stored range can never match a row.
fn lookup_id(id: i64, kind: &str) -> Result<u32> {
    u32::try_from(id).map_err(|_| FilmorateError::not_found(format!("{} {} not found", kind, id)))
}

impl UserBody {
    pub fn validate(&self, today: NaiveDate) -> Result<UserDraft> {
        if !EMAIL.is_match(&self.email) {
            return reject("User email is not a valid address");
        }
        if self.login.trim().is_empty() {
            return reject("User login must not be blank");
        }
        if self.login.chars().any(char::is_whitespace) {
            return reject("User login must not contain whitespace");
        }
        let birthday = match self.birthday {
            Some(date) => date,
            None => return reject("User birthday must be set"),
        };
        if birthday > today {
            return reject("User birthday must not be in the future");
        }
        Ok(UserDraft {
            email: self.email.clone(),
            login: self.login.clone(),
            name: display_name(self.name.as_deref(), &self.login),
            birthday,
        })
    }
}

pub fn display_name(name: Option<&str>, login: &str) -> String {
    match name {
        Some(name) if !name.trim().is_empty() => name.to_owned(),
        _ => login.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2024, 1, 1)
    }

    fn film() -> FilmBody {
        FilmBody {
            id: None,
            name: "Titanic".to_owned(),
            description: Some("Ship, iceberg".to_owned()),
            release_date: Some(date(1997, 12, 19)),
            duration: 194,
            mpa: Some(IdRef { id: 3 }),
            genres: Some(vec![IdRef { id: 2 }, IdRef { id: 2 }, IdRef { id: 1 }]),
        }
    }

    fn user() -> UserBody {
        UserBody {
            id: None,
            email: "jack@example.com".to_owned(),
            login: "jack".to_owned(),
            name: Some("Jack Dawson".to_owned()),
            birthday: Some(date(1990, 4, 15)),
        }
    }

    #[test]
    fn valid_film() {
        let draft = film().validate(today()).unwrap();
        assert_eq!(draft.name, "Titanic");
        assert_eq!(draft.duration, 194);
        assert_eq!(draft.mpa, 3);
        assert_eq!(draft.genres.into_iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn release_date_floor() {
        let mut body = film();
        body.release_date = Some(date(1895, 12, 28));
        assert!(body.validate(today()).is_ok());
        body.release_date = Some(date(1895, 12, 27));
        assert!(matches!(
            body.validate(today()),
            Err(FilmorateError::Validation(_))
        ));
    }

    #[test]
    fn release_date_in_future() {
        let mut body = film();
        body.release_date = Some(date(2024, 1, 2));
        assert!(body.validate(today()).is_err());
        body.release_date = Some(today());
        assert!(body.validate(today()).is_ok());
    }

    #[test]
    fn film_field_rules() {
        let mut body = film();
        body.name = "  ".to_owned();
        assert!(body.validate(today()).is_err());

        let mut body = film();
        body.description = Some("x".repeat(200));
        assert!(body.validate(today()).is_ok());
        body.description = Some("x".repeat(201));
        assert!(body.validate(today()).is_err());

        let mut body = film();
        body.duration = 0;
        assert!(body.validate(today()).is_err());
        body.duration = -5;
        assert!(body.validate(today()).is_err());

        let mut body = film();
        body.mpa = None;
        assert!(body.validate(today()).is_err());

        let mut body = film();
        body.release_date = None;
        assert!(body.validate(today()).is_err());
    }

    #[test]
    fn out_of_range_lookup_ids_are_not_found() {
        let mut body = film();
        body.mpa = Some(IdRef { id: -1 });
        assert!(matches!(
            body.validate(today()),
            Err(FilmorateError::NotFound(_))
        ));

        let mut body = film();
        body.genres = Some(vec![IdRef { id: 1 }, IdRef { id: i64::from(u32::MAX) + 1 }]);
        assert!(matches!(
            body.validate(today()),
            Err(FilmorateError::NotFound(_))
        ));
    }

    #[test]
    fn missing_description_and_genres() {
        let mut body = film();
        body.description = None;
        body.genres = None;
        let draft = body.validate(today()).unwrap();
        assert_eq!(draft.description, "");
        assert!(draft.genres.is_empty());
    }

    #[test]
    fn valid_user() {
        let draft = user().validate(today()).unwrap();
        assert_eq!(draft.name, "Jack Dawson");
        assert_eq!(draft.login, "jack");
    }

    #[test]
    fn blank_name_falls_back_to_login() {
        let mut body = user();
        body.name = Some(" ".to_owned());
        assert_eq!(body.validate(today()).unwrap().name, "jack");
        body.name = None;
        assert_eq!(body.validate(today()).unwrap().name, "jack");
    }

    #[test]
    fn user_field_rules() {
        let mut body = user();
        body.email = "jack.example.com".to_owned();
        assert!(body.validate(today()).is_err());

        let mut body = user();
        body.login = "".to_owned();
        assert!(body.validate(today()).is_err());
        body.login = "jack dawson".to_owned();
        assert!(body.validate(today()).is_err());

        let mut body = user();
        body.birthday = Some(date(2030, 1, 1));
        assert!(body.validate(today()).is_err());
        body.birthday = Some(today());
        assert!(body.validate(today()).is_ok());
    }
}
