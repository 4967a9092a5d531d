use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::auth::{Permission, SessionUser};
use crate::clients::{MediaStore, MediaUpload, delete_quietly};
use crate::database::courses::NewCourse;
use crate::database::sub_sections::NewSubSection;
use crate::database::{categories, courses, sections, sub_sections};
use crate::error::AppError;
use crate::models::{Course, CourseStatus, Section, SubSection};
use crate::validation::{not_blank, validate_input};

use super::projection::{CourseDetails, course_details};

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CourseInput {
    #[validate(custom(function = "not_blank"))]
    pub course_name: String,
    #[validate(custom(function = "not_blank"))]
    pub course_description: String,
    #[validate(custom(function = "not_blank"))]
    pub what_you_will_learn: String,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub price: f64,
    #[validate(custom(function = "not_blank"))]
    pub category_id: String,
    #[validate(length(min = 1, message = "must contain at least one entry"))]
    pub tag: Vec<String>,
    #[validate(length(min = 1, message = "must contain at least one entry"))]
    pub instructions: Vec<String>,
    pub status: Option<CourseStatus>,
}

/// Partial course update. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CourseChanges {
    #[validate(custom(function = "not_blank"))]
    pub course_name: Option<String>,
    #[validate(custom(function = "not_blank"))]
    pub course_description: Option<String>,
    #[validate(custom(function = "not_blank"))]
    pub what_you_will_learn: Option<String>,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub price: Option<f64>,
    pub category_id: Option<String>,
    pub tag: Option<Vec<String>>,
    pub instructions: Option<Vec<String>>,
    pub status: Option<CourseStatus>,
}

impl CourseChanges {
    fn apply(self, course: &mut Course) {
        if let Some(v) = self.course_name {
            course.course_name = v.trim().to_string();
        }
        if let Some(v) = self.course_description {
            course.course_description = v;
        }
        if let Some(v) = self.what_you_will_learn {
            course.what_you_will_learn = v;
        }
        if let Some(v) = self.price {
            course.price = v;
        }
        if let Some(v) = self.category_id {
            course.category_id = Some(v);
        }
        if let Some(v) = self.tag {
            course.tag = v;
        }
        if let Some(v) = self.instructions {
            course.instructions = v;
        }
        if let Some(v) = self.status {
            course.status = v;
        }
    }
}

/// New lecture fields. `time_duration` is used when the media store cannot
/// report the video length itself.
#[derive(Debug, Clone, Default)]
pub struct SubSectionInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub time_duration: Option<f64>,
}

fn ensure_publishable(course: &Course) -> Result<(), AppError> {
    if course.status == CourseStatus::Published
        && (course.tag.is_empty() || course.instructions.is_empty())
    {
        return Err(AppError::Validation(
            "A published course needs at least one tag and one instruction".to_string(),
        ));
    }
    Ok(())
}

fn ensure_owner(course: &Course, user: &SessionUser) -> Result<(), AppError> {
    if course.instructor_id != user.id {
        warn!(course_id = %course.id, user_id = %user.id, "Rejected change to another instructor's course");
        return Err(AppError::Authorization(
            "Only the course instructor can change this course".to_string(),
        ));
    }
    Ok(())
}

async fn owned_course(pool: &Pool<Sqlite>, user: &SessionUser, course_id: &str) -> Result<Course, AppError> {
    user.require_permission(Permission::ManageOwnCourses)?;
    let course = courses::get_course(pool, course_id).await?;
    ensure_owner(&course, user)?;
    Ok(course)
}

async fn owned_section(
    pool: &Pool<Sqlite>,
    user: &SessionUser,
    section_id: &str,
) -> Result<(Course, Section), AppError> {
    let section = sections::get_section(pool, section_id).await?;
    let course = owned_course(pool, user, &section.course_id).await?;
    Ok((course, section))
}

async fn owned_sub_section(
    pool: &Pool<Sqlite>,
    user: &SessionUser,
    sub_section_id: &str,
) -> Result<(Course, SubSection), AppError> {
    let sub_section = sub_sections::get_sub_section(pool, sub_section_id).await?;
    let (course, _) = owned_section(pool, user, &sub_section.section_id).await?;
    Ok((course, sub_section))
}

async fn details(pool: &Pool<Sqlite>, course_id: &str) -> Result<CourseDetails, AppError> {
    let mut conn = pool.acquire().await?;
    course_details(&mut conn, course_id, None).await
}

async fn upload(media: &dyn MediaStore, file: MediaUpload) -> Result<crate::clients::StoredMedia, AppError> {
    media.upload(file).await.map_err(|e| match e {
        AppError::ExternalService(_) => e,
        other => AppError::ExternalService(format!("Media upload failed: {}", other)),
    })
}

/// Uploads the thumbnail first, then writes the course row.
#[instrument(skip(pool, media, input, thumbnail), fields(user_id = %user.id))]
pub async fn create_course(
    pool: &Pool<Sqlite>,
    media: &dyn MediaStore,
    user: &SessionUser,
    input: CourseInput,
    thumbnail: MediaUpload,
) -> Result<CourseDetails, AppError> {
    user.require_permission(Permission::CreateCourses)?;
    validate_input(&input)?;

    categories::get_category(pool, &input.category_id).await?;

    let stored = upload(media, thumbnail).await?;

    let new_course = NewCourse {
        course_name: input.course_name.trim().to_string(),
        course_description: input.course_description,
        instructor_id: user.id.clone(),
        what_you_will_learn: input.what_you_will_learn,
        price: input.price,
        thumbnail_url: stored.secure_url.clone(),
        category_id: Some(input.category_id),
        tag: input.tag,
        instructions: input.instructions,
        status: input.status.unwrap_or_default(),
    };

    let course = match courses::insert_course(pool, &new_course).await {
        Ok(course) => course,
        Err(err) => {
            delete_quietly(media, &stored.secure_url).await;
            return Err(err);
        }
    };

    info!(course_id = %course.id, "Course created");
    details(pool, &course.id).await
}

/// Applies `changes` to the course. A supplied `expected_version` that no
/// longer matches the stored version is rejected with `Conflict`.
#[instrument(skip(pool, media, changes, thumbnail), fields(user_id = %user.id))]
pub async fn edit_course(
    pool: &Pool<Sqlite>,
    media: &dyn MediaStore,
    user: &SessionUser,
    course_id: &str,
    changes: CourseChanges,
    thumbnail: Option<MediaUpload>,
    expected_version: Option<i64>,
) -> Result<CourseDetails, AppError> {
    validate_input(&changes)?;
    owned_course(pool, user, course_id).await?;

    let new_thumbnail = match thumbnail {
        Some(file) => Some(upload(media, file).await?.secure_url),
        None => None,
    };

    match apply_course_changes(pool, course_id, changes, new_thumbnail.clone(), expected_version).await {
        Ok(previous_thumbnail) => {
            if new_thumbnail.is_some() {
                delete_quietly(media, &previous_thumbnail).await;
            }
        }
        Err(err) => {
            if let Some(url) = &new_thumbnail {
                delete_quietly(media, url).await;
            }
            return Err(err);
        }
    }

    info!(course_id = %course_id, "Course updated");
    details(pool, course_id).await
}

/// Returns the thumbnail URL the course had before the update.
async fn apply_course_changes(
    pool: &Pool<Sqlite>,
    course_id: &str,
    changes: CourseChanges,
    new_thumbnail: Option<String>,
    expected_version: Option<i64>,
) -> Result<String, AppError> {
    let mut tx = pool.begin().await?;

    let mut course = courses::get_course(&mut *tx, course_id).await?;

    if let Some(expected) = expected_version {
        if expected != course.version {
            return Err(AppError::Conflict(format!(
                "Course was modified (version {} expected, found {})",
                expected, course.version
            )));
        }
    }

    if let Some(category_id) = &changes.category_id {
        categories::get_category(&mut *tx, category_id).await?;
    }

    let previous_thumbnail = course.thumbnail_url.clone();
    changes.apply(&mut course);
    if let Some(url) = new_thumbnail {
        course.thumbnail_url = url;
    }

    ensure_publishable(&course)?;

    if !courses::update_course(&mut *tx, &course).await? {
        return Err(AppError::Conflict(
            "Course was modified by another request".to_string(),
        ));
    }

    tx.commit().await?;
    Ok(previous_thumbnail)
}

/// Removes the thumbnail and each section's videos, then deletes sub-sections,
/// sections and finally the course in one transaction. Media is cleared
/// before the write lock is taken; cleanup failures are only logged.
#[instrument(skip(pool, media), fields(user_id = %user.id))]
pub async fn delete_course(
    pool: &Pool<Sqlite>,
    media: &dyn MediaStore,
    user: &SessionUser,
    course_id: &str,
) -> Result<(), AppError> {
    let course = owned_course(pool, user, course_id).await?;

    let section_rows = sections::sections_for_course(pool, course_id).await?;
    let mut tree = Vec::with_capacity(section_rows.len());
    for section in section_rows {
        let subs = sub_sections::sub_sections_for_section(pool, &section.id).await?;
        tree.push((section, subs));
    }

    delete_quietly(media, &course.thumbnail_url).await;
    for (_, subs) in &tree {
        for sub_section in subs {
            delete_quietly(media, &sub_section.video_url).await;
        }
    }

    let mut tx = pool.begin().await?;
    for (section, subs) in &tree {
        for sub_section in subs {
            sub_sections::delete_sub_section(&mut *tx, &sub_section.id).await?;
        }
        sections::delete_section(&mut *tx, &section.id).await?;
    }

    courses::delete_course(&mut *tx, course_id).await?;
    tx.commit().await?;

    info!(course_id = %course_id, sections = tree.len(), "Course deleted");
    Ok(())
}

#[instrument(skip(pool), fields(user_id = %user.id))]
pub async fn create_section(
    pool: &Pool<Sqlite>,
    user: &SessionUser,
    course_id: &str,
    section_name: &str,
) -> Result<CourseDetails, AppError> {
    if section_name.trim().is_empty() {
        return Err(AppError::Validation("sectionName: must not be blank".to_string()));
    }
    owned_course(pool, user, course_id).await?;

    let mut tx = pool.begin().await?;
    let section = sections::insert_section(&mut *tx, course_id, section_name.trim()).await?;
    courses::touch_course(&mut *tx, course_id).await?;
    tx.commit().await?;

    info!(section_id = %section.id, "Section created");
    details(pool, course_id).await
}

#[instrument(skip(pool), fields(user_id = %user.id))]
pub async fn update_section(
    pool: &Pool<Sqlite>,
    user: &SessionUser,
    section_id: &str,
    section_name: &str,
) -> Result<CourseDetails, AppError> {
    if section_name.trim().is_empty() {
        return Err(AppError::Validation("sectionName: must not be blank".to_string()));
    }
    let (course, _) = owned_section(pool, user, section_id).await?;

    let mut tx = pool.begin().await?;
    sections::rename_section(&mut *tx, section_id, section_name.trim()).await?;
    courses::touch_course(&mut *tx, &course.id).await?;
    tx.commit().await?;

    details(pool, &course.id).await
}

/// Deletes the section's videos and sub-sections before the section itself.
#[instrument(skip(pool, media), fields(user_id = %user.id))]
pub async fn delete_section(
    pool: &Pool<Sqlite>,
    media: &dyn MediaStore,
    user: &SessionUser,
    section_id: &str,
) -> Result<CourseDetails, AppError> {
    let (course, _) = owned_section(pool, user, section_id).await?;
    let subs = sub_sections::sub_sections_for_section(pool, section_id).await?;

    for sub_section in &subs {
        delete_quietly(media, &sub_section.video_url).await;
    }

    let mut tx = pool.begin().await?;
    for sub_section in &subs {
        sub_sections::delete_sub_section(&mut *tx, &sub_section.id).await?;
    }
    sections::delete_section(&mut *tx, section_id).await?;
    courses::touch_course(&mut *tx, &course.id).await?;
    tx.commit().await?;

    info!(section_id = %section_id, sub_sections = subs.len(), "Section deleted");
    details(pool, &course.id).await
}

/// Whole seconds from the media store, else from the client. None when
/// neither gives a usable value.
fn duration_seconds(from_store: Option<f64>, fallback: Option<f64>) -> Option<i64> {
    let usable = |d: &f64| d.is_finite() && *d >= 0.0;
    from_store
        .filter(usable)
        .or(fallback.filter(usable))
        .map(|d| d.round() as i64)
}

#[instrument(skip(pool, media, input, video), fields(user_id = %user.id))]
pub async fn create_sub_section(
    pool: &Pool<Sqlite>,
    media: &dyn MediaStore,
    user: &SessionUser,
    section_id: &str,
    input: SubSectionInput,
    video: MediaUpload,
) -> Result<CourseDetails, AppError> {
    let title = input.title.as_deref().map(str::trim).unwrap_or_default();
    let description = input.description.as_deref().unwrap_or_default();
    if title.is_empty() || description.trim().is_empty() {
        return Err(AppError::Validation(
            "title and description are required".to_string(),
        ));
    }

    let (course, _) = owned_section(pool, user, section_id).await?;
    let stored = upload(media, video).await?;

    let Some(time_duration_seconds) = duration_seconds(stored.duration_seconds, input.time_duration)
    else {
        delete_quietly(media, &stored.secure_url).await;
        return Err(AppError::Validation(
            "timeDuration: is required when the video length cannot be read".to_string(),
        ));
    };

    let new_sub_section = NewSubSection {
        section_id: section_id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        time_duration_seconds,
        video_url: stored.secure_url.clone(),
    };

    let written = async {
        let mut tx = pool.begin().await?;
        let sub_section = sub_sections::insert_sub_section(&mut *tx, &new_sub_section).await?;
        courses::touch_course(&mut *tx, &course.id).await?;
        tx.commit().await?;
        Ok::<_, AppError>(sub_section)
    }
    .await;

    match written {
        Ok(sub_section) => info!(sub_section_id = %sub_section.id, "Sub-section created"),
        Err(err) => {
            delete_quietly(media, &stored.secure_url).await;
            return Err(err);
        }
    }

    details(pool, &course.id).await
}

/// A new video replaces the old one, whose file is then removed. The stored
/// duration is kept when neither the store nor the client reports a new one.
#[instrument(skip(pool, media, input, video), fields(user_id = %user.id))]
pub async fn update_sub_section(
    pool: &Pool<Sqlite>,
    media: &dyn MediaStore,
    user: &SessionUser,
    sub_section_id: &str,
    input: SubSectionInput,
    video: Option<MediaUpload>,
) -> Result<CourseDetails, AppError> {
    let (course, mut sub_section) = owned_sub_section(pool, user, sub_section_id).await?;

    if let Some(title) = input.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        sub_section.title = title.to_string();
    }
    if let Some(description) = input.description.filter(|d| !d.trim().is_empty()) {
        sub_section.description = description;
    }

    let previous_video = sub_section.video_url.clone();
    let replaced = match video {
        Some(file) => {
            let stored = upload(media, file).await?;
            if let Some(seconds) = duration_seconds(stored.duration_seconds, input.time_duration) {
                sub_section.time_duration_seconds = seconds;
            }
            sub_section.video_url = stored.secure_url;
            true
        }
        None => {
            if let Some(seconds) = duration_seconds(None, input.time_duration) {
                sub_section.time_duration_seconds = seconds;
            }
            false
        }
    };

    let written = async {
        let mut tx = pool.begin().await?;
        sub_sections::update_sub_section(&mut *tx, &sub_section).await?;
        courses::touch_course(&mut *tx, &course.id).await?;
        tx.commit().await?;
        Ok::<_, AppError>(())
    }
    .await;

    if let Err(err) = written {
        if replaced {
            delete_quietly(media, &sub_section.video_url).await;
        }
        return Err(err);
    }

    if replaced {
        delete_quietly(media, &previous_video).await;
    }

    details(pool, &course.id).await
}

#[instrument(skip(pool, media), fields(user_id = %user.id))]
pub async fn delete_sub_section(
    pool: &Pool<Sqlite>,
    media: &dyn MediaStore,
    user: &SessionUser,
    sub_section_id: &str,
) -> Result<CourseDetails, AppError> {
    let (course, sub_section) = owned_sub_section(pool, user, sub_section_id).await?;

    let mut tx = pool.begin().await?;
    sub_sections::delete_sub_section(&mut *tx, sub_section_id).await?;
    courses::touch_course(&mut *tx, &course.id).await?;
    tx.commit().await?;

    delete_quietly(media, &sub_section.video_url).await;

    info!(sub_section_id = %sub_section_id, "Sub-section deleted");
    details(pool, &course.id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_prefers_store_value() {
        assert_eq!(duration_seconds(Some(61.6), Some(10.0)), Some(62));
        assert_eq!(duration_seconds(None, Some(10.2)), Some(10));
        assert_eq!(duration_seconds(Some(f64::NAN), Some(7.0)), Some(7));
        assert_eq!(duration_seconds(None, None), None);
        assert_eq!(duration_seconds(Some(-3.0), None), None);
    }
}
