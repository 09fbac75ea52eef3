use crate::error::FilmorateError;
use crate::model::*;
use crate::service::{FilmService, LookupService, UserService};
use crate::validation::{FilmBody, UserBody};
use actix_web::{error, web, HttpRequest, HttpResponse};
use log::debug;
use serde::Deserialize;

type Films = web::Data<FilmService>;
type Users = web::Data<UserService>;
type Lookups = web::Data<LookupService>;
type Result = actix_web::Result<HttpResponse>;

pub const DEFAULT_POPULAR_COUNT: i64 = 10;

fn bad_json(err: error::JsonPayloadError, _req: &HttpRequest) -> error::Error {
    debug!("{:?}", err);
    FilmorateError::validation(format!("Malformed body: {}", err)).into()
}

fn bad_query(err: error::QueryPayloadError, _req: &HttpRequest) -> error::Error {
    debug!("{:?}", err);
    FilmorateError::validation(format!("Malformed query: {}", err)).into()
}

fn bad_path(err: error::PathError, _req: &HttpRequest) -> error::Error {
    debug!("{:?}", err);
    FilmorateError::validation(format!("Malformed path: {}", err)).into()
}

/// Registers every route plus the extractor error mapping.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(bad_json))
        .app_data(web::QueryConfig::default().error_handler(bad_query))
        .app_data(web::PathConfig::default().error_handler(bad_path))
        .service(
            web::scope("/films")
                .route("", web::get().to(all_films))
                .route("", web::post().to(create_film))
                .route("", web::put().to(update_film))
                .route("/popular", web::get().to(popular_films))
                .route("/{id}", web::get().to(film_by_id))
                .route("/{id}", web::delete().to(delete_film))
                .route("/{id}/like/{user_id}", web::put().to(add_like))
                .route("/{id}/like/{user_id}", web::delete().to(delete_like)),
        )
        .service(
            web::scope("/users")
                .route("", web::get().to(all_users))
                .route("", web::post().to(create_user))
                .route("", web::put().to(update_user))
                .route("/{id}", web::get().to(user_by_id))
                .route("/{id}/friends", web::get().to(friends))
                .route("/{id}/friends/common/{other_id}", web::get().to(common_friends))
                .route("/{id}/friends/{friend_id}", web::put().to(add_friend))
                .route("/{id}/friends/{friend_id}", web::delete().to(delete_friend)),
        )
        .route("/genres", web::get().to(all_genres))
        .route("/genres/{id}", web::get().to(genre_by_id))
        .route("/mpa", web::get().to(all_ratings))
        .route("/mpa/{id}", web::get().to(rating_by_id));
}

async fn all_films(films: Films) -> Result {
    Ok(HttpResponse::Ok().json(films.all_films()?))
}

async fn create_film(body: web::Json<FilmBody>, films: Films) -> Result {
    Ok(HttpResponse::Ok().json(films.create_film(&body)?))
}

async fn update_film(body: web::Json<FilmBody>, films: Films) -> Result {
    Ok(HttpResponse::Ok().json(films.update_film(&body)?))
}

async fn film_by_id(path: web::Path<FilmId>, films: Films) -> Result {
    Ok(HttpResponse::Ok().json(films.find_film_by_id(path.into_inner())?))
}

async fn delete_film(path: web::Path<FilmId>, films: Films) -> Result {
    films.delete_film(path.into_inner())?;
    Ok(HttpResponse::Ok().finish())
}

async fn add_like(path: web::Path<(FilmId, UserId)>, films: Films) -> Result {
    let (film_id, user_id) = path.into_inner();
    films.add_like(film_id, user_id)?;
    Ok(HttpResponse::Ok().finish())
}

async fn delete_like(path: web::Path<(FilmId, UserId)>, films: Films) -> Result {
    let (film_id, user_id) = path.into_inner();
    films.delete_like(film_id, user_id)?;
    Ok(HttpResponse::Ok().finish())
}

#[derive(Deserialize)]
struct PopularParams {
    count: Option<i64>,
}

async fn popular_films(params: web::Query<PopularParams>, films: Films) -> Result {
    let count = params.count.unwrap_or(DEFAULT_POPULAR_COUNT);
    Ok(HttpResponse::Ok().json(films.show_most_liked_films(count)?))
}

async fn all_users(users: Users) -> Result {
    Ok(HttpResponse::Ok().json(users.all_users()?))
}

async fn create_user(body: web::Json<UserBody>, users: Users) -> Result {
    Ok(HttpResponse::Ok().json(users.create_user(&body)?))
}

async fn update_user(body: web::Json<UserBody>, users: Users) -> Result {
    Ok(HttpResponse::Ok().json(users.update_user(&body)?))
}

async fn user_by_id(path: web::Path<UserId>, users: Users) -> Result {
    Ok(HttpResponse::Ok().json(users.find_user_by_id(path.into_inner())?))
}

async fn friends(path: web::Path<UserId>, users: Users) -> Result {
    Ok(HttpResponse::Ok().json(users.show_friends(path.into_inner())?))
}

async fn common_friends(path: web::Path<(UserId, UserId)>, users: Users) -> Result {
    let (user_id, other_id) = path.into_inner();
    Ok(HttpResponse::Ok().json(users.show_common_friends(user_id, other_id)?))
}

async fn add_friend(path: web::Path<(UserId, UserId)>, users: Users) -> Result {
    let (user_id, friend_id) = path.into_inner();
    users.add_friend(user_id, friend_id)?;
    Ok(HttpResponse::Ok().finish())
}

async fn delete_friend(path: web::Path<(UserId, UserId)>, users: Users) -> Result {
    let (user_id, friend_id) = path.into_inner();
    users.delete_friend(user_id, friend_id)?;
    Ok(HttpResponse::Ok().finish())
}

async fn all_genres(lookups: Lookups) -> Result {
    Ok(HttpResponse::Ok().json(lookups.all_genres()?))
}

async fn genre_by_id(path: web::Path<GenreId>, lookups: Lookups) -> Result {
    Ok(HttpResponse::Ok().json(lookups.find_genre_by_id(path.into_inner())?))
}

async fn all_ratings(lookups: Lookups) -> Result {
    Ok(HttpResponse::Ok().json(lookups.all_ratings()?))
}

async fn rating_by_id(path: web::Path<RatingId>, lookups: Lookups) -> Result {
    Ok(HttpResponse::Ok().json(lookups.find_rating_by_id(path.into_inner())?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;
    use crate::service::FriendshipMode;
    use crate::storage::Storage;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};
    use std::sync::Arc;

    macro_rules! app {
        () => {{
            let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
            let users = UserService::new(storage.clone(), FriendshipMode::Direct);
            let films = FilmService::new(storage.clone(), users.clone());
            test::init_service(
                App::new()
                    .app_data(web::Data::new(films))
                    .app_data(web::Data::new(users))
                    .app_data(web::Data::new(LookupService::new(storage)))
                    .configure(configure),
            )
            .await
        }};
    }

    fn titanic() -> Value {
        json!({
            "name": "Titanic",
            "description": "Ship, iceberg",
            "releaseDate": "2000-06-21",
            "duration": 120,
            "mpa": {"id": 1, "name": "G"}
        })
    }

    fn user(login: &str) -> Value {
        json!({
            "email": format!("{}@example.com", login),
            "login": login,
            "name": "",
            "birthday": "1990-04-15"
        })
    }

    #[actix_rt::test]
    async fn create_and_get_film() {
        let app = app!();
        let req = test::TestRequest::post().uri("/films").set_json(titanic()).to_request();
        let film: Value = test::call_and_read_body_json(&app, req).await;
        let id = film["id"].as_u64().unwrap();
        assert_eq!(film["mpa"]["name"], "G");

        let req = test::TestRequest::get().uri(&format!("/films/{}", id)).to_request();
        let film: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(film["name"], "Titanic");
        assert_eq!(film["releaseDate"], "2000-06-21");

        let mut early = titanic();
        early["releaseDate"] = json!("1895-12-27");
        let req = test::TestRequest::post().uri("/films").set_json(early).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Validation error");
        assert!(body["description"].as_str().unwrap().contains("1895-12-28"));
    }

    #[actix_rt::test]
    async fn unknown_lookups_are_not_found() {
        let app = app!();
        let mut film = titanic();
        film["mpa"] = json!({"id": 42});
        let req = test::TestRequest::post().uri("/films").set_json(film).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let mut film = titanic();
        film["genres"] = json!([{"id": 1}, {"id": 77}]);
        let req = test::TestRequest::post().uri("/films").set_json(film).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get().uri("/genres/77").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
        let req = test::TestRequest::get().uri("/mpa/3").to_request();
        let rating: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(rating, json!({"id": 3, "name": "PG-13"}));
        let req = test::TestRequest::get().uri("/genres").to_request();
        let genres: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(genres.as_array().unwrap().len(), 6);
    }

    #[actix_rt::test]
    async fn update_film_errors() {
        let app = app!();
        let req = test::TestRequest::put().uri("/films").set_json(titanic()).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let mut film = titanic();
        film["id"] = json!(999);
        let req = test::TestRequest::put().uri("/films").set_json(film).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri("/films")
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"name\": 5")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_rt::test]
    async fn malformed_ids_are_bad_requests() {
        let app = app!();
        for uri in ["/films/abc", "/users/-1", "/users/x/friends", "/mpa/1.5"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", uri);
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["error"], "Validation error");
            assert!(body["description"].as_str().unwrap().starts_with("Malformed path"));
        }

        let mut film = titanic();
        film["mpa"] = json!({"id": -1});
        let req = test::TestRequest::post().uri("/films").set_json(film).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let mut film = titanic();
        film["genres"] = json!([{"id": -3}]);
        let req = test::TestRequest::post().uri("/films").set_json(film).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn genres_are_deduplicated_and_sorted() {
        let app = app!();
        let mut film = titanic();
        film["genres"] = json!([{"id": 4}, {"id": 1}, {"id": 4}]);
        let req = test::TestRequest::post().uri("/films").set_json(film).to_request();
        let film: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            film["genres"],
            json!([{"id": 1, "name": "Comedy"}, {"id": 4, "name": "Thriller"}])
        );
    }

    #[actix_rt::test]
    async fn likes_and_popular() {
        let app = app!();
        for _ in 0..2 {
            let req = test::TestRequest::post().uri("/films").set_json(titanic()).to_request();
            test::call_service(&app, req).await;
        }
        let req = test::TestRequest::post().uri("/users").set_json(user("rose")).to_request();
        let rose: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(rose["name"], "rose");
        let rose_id = rose["id"].as_u64().unwrap();

        let like = format!("/films/2/like/{}", rose_id);
        let req = test::TestRequest::put().uri(&like).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        let req = test::TestRequest::put().uri(&like).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
        let req = test::TestRequest::put().uri("/films/2/like/99").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get().uri("/films/popular?count=1").to_request();
        let popular: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(popular.as_array().unwrap().len(), 1);
        assert_eq!(popular[0]["id"], 2);

        let req = test::TestRequest::get().uri("/films/popular").to_request();
        let popular: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(popular.as_array().unwrap().len(), 2);

        let req = test::TestRequest::get().uri("/films/popular?count=ten").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::delete().uri(&like).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        let req = test::TestRequest::delete().uri(&like).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::delete().uri("/films/2").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        let req = test::TestRequest::delete().uri("/films/2").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn friends_routes() {
        let app = app!();
        let mut ids = Vec::new();
        for login in ["a", "b", "c"] {
            let req = test::TestRequest::post().uri("/users").set_json(user(login)).to_request();
            let created: Value = test::call_and_read_body_json(&app, req).await;
            ids.push(created["id"].as_u64().unwrap());
        }
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        for (user_id, friend_id) in [(a, c), (b, c), (a, b)] {
            let uri = format!("/users/{}/friends/{}", user_id, friend_id);
            let req = test::TestRequest::put().uri(&uri).to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        }

        let uri = format!("/users/{}/friends/{}", a, a);
        let req = test::TestRequest::put().uri(&uri).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri(&format!("/users/{}/friends", a)).to_request();
        let friends: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(friends.as_array().unwrap().len(), 2);

        let uri = format!("/users/{}/friends/common/{}", a, b);
        let req = test::TestRequest::get().uri(&uri).to_request();
        let common: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(common.as_array().unwrap().len(), 1);
        assert_eq!(common[0]["id"], c);

        let uri = format!("/users/{}/friends/common/{}", a, a);
        let req = test::TestRequest::get().uri(&uri).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/users/99/friends").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let uri = format!("/users/{}/friends/{}", a, c);
        let req = test::TestRequest::delete().uri(&uri).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        let req = test::TestRequest::get().uri(&format!("/users/{}", a)).to_request();
        let user_a: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(user_a["friends"], json!([b]));
    }

    #[actix_rt::test]
    async fn user_validation() {
        let app = app!();
        let mut bad = user("jack");
        bad["login"] = json!("jack dawson");
        let req = test::TestRequest::post().uri("/users").set_json(bad).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let mut bad = user("jack");
        bad["email"] = json!("not-an-email");
        let req = test::TestRequest::post().uri("/users").set_json(bad).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let mut missing = user("jack");
        missing["id"] = json!(5);
        let req = test::TestRequest::put().uri("/users").set_json(missing).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Not found");
    }
}
