use utoipa::OpenApi;
use utoipa::ToSchema;

#[derive(ToSchema)]
pub struct HealthResponse { pub status: String }

/// Body of `/auth/register` and `/auth/login`.
#[derive(ToSchema)]
pub struct CredentialsDoc { pub username: String, pub password: String }

#[derive(ToSchema)]
pub struct NewRestaurantDoc { pub name: String }

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health,
        crate::routes::auth::register,
        crate::routes::auth::login,
        crate::routes::auth::logout,
        crate::routes::auth::me,
        crate::routes::restaurants::list,
        crate::routes::restaurants::detail,
        crate::routes::restaurants::rate,
        crate::routes::waiters::rate,
        crate::routes::admin::list_restaurants,
        crate::routes::admin::create_restaurant,
        crate::routes::admin::delete_restaurant,
        crate::routes::admin::list_waiters,
        crate::routes::admin::create_waiter,
        crate::routes::admin::delete_waiter,
        crate::routes::backup::backup,
        crate::routes::backup::restore,
    ),
    components(
        schemas(
            HealthResponse,
            CredentialsDoc,
            NewRestaurantDoc,
        )
    ),
    tags(
        (name = "health"),
        (name = "auth"),
        (name = "restaurants"),
        (name = "waiters"),
        (name = "admin"),
        (name = "backup")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_rating_routes() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/restaurants/{id}/rate/{rating}"));
        assert!(paths.contains_key("/waiters/{id}/rate/{rating}"));
        assert!(paths.contains_key("/admin/restore"));
    }
}
