use rand::SeedableRng;
use rand::rngs::StdRng;
use rocket::serde::json::Json;
use rocket::{Route, State, delete, get, post, routes};
use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use tracing::info;
use validator::Validate;

use crate::auth::{Permission, SessionUser};
use crate::database::categories;
use crate::models::Category;
use crate::services::projection::{self, CategoryPage};
use crate::validation::{JsonValidateExt, not_blank};

use super::ApiResult;
use super::response::ApiResponse;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    name: String,
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPageRequest {
    category_id: String,
}

#[post("/course/createCategory", data = "<request>")]
pub async fn create_category(
    user: SessionUser,
    request: Json<CreateCategoryRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Category> {
    user.require_permission(Permission::ManageCategories)?;
    let request = request.validate_custom()?;

    let category =
        categories::create_category(db.inner(), request.name.trim(), request.description.trim()).await?;
    info!(category_id = %category.id, "Category created");

    Ok(ApiResponse::ok("Category created successfully", category))
}

#[get("/course/showAllCategories")]
pub async fn show_all_categories(db: &State<Pool<Sqlite>>) -> ApiResult<Vec<Category>> {
    let all = categories::list_categories(db.inner()).await?;
    Ok(ApiResponse::ok("All categories fetched successfully", all))
}

#[delete("/course/deleteCategory/<id>")]
pub async fn delete_category(user: SessionUser, id: &str, db: &State<Pool<Sqlite>>) -> ApiResult<()> {
    user.require_permission(Permission::ManageCategories)?;
    categories::delete_category(db.inner(), id).await?;
    Ok(ApiResponse::message("Category deleted successfully"))
}

#[post("/course/getCategoryPageDetails", data = "<request>")]
pub async fn get_category_page_details(
    request: Json<CategoryPageRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<CategoryPage> {
    let mut rng = StdRng::from_os_rng();
    let mut conn = db.acquire().await?;
    let page = projection::category_page(&mut conn, &request.category_id, &mut rng).await?;

    let message = if page.selected_category.courses.is_empty() {
        "No published courses found for the selected category"
    } else {
        "Category page details fetched successfully"
    };

    Ok(ApiResponse::ok(message, page))
}

pub fn routes() -> Vec<Route> {
    routes![
        create_category,
        show_all_categories,
        delete_category,
        get_category_page_details
    ]
}
