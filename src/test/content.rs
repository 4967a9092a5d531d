#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use sqlx::{Pool, Sqlite};

    use crate::clients::{MediaStore, MediaUpload, StoredMedia};
    use crate::database::{categories, courses, sections, sub_sections};
    use crate::error::AppError;
    use crate::models::CourseStatus;
    use crate::services::content::{self, CourseChanges, CourseInput, SubSectionInput};
    use crate::test::test_utils::{MemoryMediaStore, create_standard_test_db, upload};

    /// Counts deletes issued while the test pool's only connection is held elsewhere.
    struct LockAwareStore {
        inner: MemoryMediaStore,
        pool: Pool<Sqlite>,
        deletes: AtomicUsize,
        deletes_while_busy: AtomicUsize,
    }

    impl LockAwareStore {
        fn new(pool: Pool<Sqlite>) -> Self {
            Self {
                inner: MemoryMediaStore::default(),
                pool,
                deletes: AtomicUsize::new(0),
                deletes_while_busy: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MediaStore for LockAwareStore {
        async fn upload(&self, upload: MediaUpload) -> Result<StoredMedia, AppError> {
            self.inner.upload(upload).await
        }

        async fn delete(&self, url: &str) -> Result<(), AppError> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            let free = tokio::time::timeout(Duration::from_millis(500), self.pool.acquire()).await;
            if !matches!(free, Ok(Ok(_))) {
                self.deletes_while_busy.fetch_add(1, Ordering::SeqCst);
            }
            self.inner.delete(url).await
        }
    }

    fn course_input(category_id: &str) -> CourseInput {
        CourseInput {
            course_name: "Async Rust".to_string(),
            course_description: "Futures, executors and pinning".to_string(),
            what_you_will_learn: "How async actually works".to_string(),
            price: 49.5,
            category_id: category_id.to_string(),
            tag: vec!["rust".to_string(), "async".to_string(), "tokio".to_string()],
            instructions: vec!["Install rustup".to_string(), "Read chapter 1".to_string()],
            status: Some(CourseStatus::Published),
        }
    }

    #[tokio::test]
    async fn test_create_course_stores_thumbnail_and_ordered_lists() {
        let db = create_standard_test_db().await;
        let media = MemoryMediaStore::default();
        let teacher = db.session("teacher@example.com");

        let details = content::create_course(
            &db.pool,
            &media,
            &teacher,
            course_input(&db.category_id("Programming")),
            upload("thumb.png", b"png"),
        )
        .await
        .unwrap();

        assert!(media.contains(&details.course.thumbnail_url));
        assert_eq!(details.course.instructor_id, teacher.id);
        assert_eq!(details.course.version, 1);
        assert_eq!(details.course.tag, vec!["rust", "async", "tokio"]);
        assert_eq!(details.course.instructions, vec!["Install rustup", "Read chapter 1"]);
        assert_eq!(details.category_name.as_deref(), Some("Programming"));
        assert_eq!(details.instructor.id, teacher.id);
        assert!(details.course_content.is_empty());
        assert_eq!(details.total_duration, "0h 0m 0s");
        assert!(details.completed_videos.is_none());

        let stored = courses::get_course(&db.pool, &details.course.id).await.unwrap();
        assert_eq!(stored.tag, details.course.tag);
    }

    #[tokio::test]
    async fn test_create_course_rejections() {
        let db = create_standard_test_db().await;
        let media = MemoryMediaStore::default();
        let category_id = db.category_id("Programming");

        let student = db.session("student@example.com");
        let result =
            content::create_course(&db.pool, &media, &student, course_input(&category_id), upload("t.png", b"x"))
                .await;
        assert!(matches!(result, Err(AppError::Authorization(_))));

        let teacher = db.session("teacher@example.com");

        let mut negative = course_input(&category_id);
        negative.price = -1.0;
        let result = content::create_course(&db.pool, &media, &teacher, negative, upload("t.png", b"x")).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let mut no_tags = course_input(&category_id);
        no_tags.tag.clear();
        let result = content::create_course(&db.pool, &media, &teacher, no_tags, upload("t.png", b"x")).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = content::create_course(
            &db.pool,
            &media,
            &teacher,
            course_input("missing-category"),
            upload("t.png", b"x"),
        )
        .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        // Nothing was uploaded for any rejected request.
        assert_eq!(media.len(), 0);
    }

    #[tokio::test]
    async fn test_create_course_upload_failure_is_external() {
        let db = create_standard_test_db().await;
        let media = MemoryMediaStore::default();
        media.set_failing_uploads(true);
        let teacher = db.session("teacher@example.com");

        let result = content::create_course(
            &db.pool,
            &media,
            &teacher,
            course_input(&db.category_id("Programming")),
            upload("t.png", b"x"),
        )
        .await;
        assert!(matches!(result, Err(AppError::ExternalService(_))));
    }

    #[tokio::test]
    async fn test_edit_course_partial_update_and_version_check() {
        let db = create_standard_test_db().await;
        let media = MemoryMediaStore::default();
        let teacher = db.session("teacher@example.com");
        let course_id = db.course_id("Rust Basics");

        let changes = CourseChanges {
            price: Some(10.0),
            tag: Some(vec!["beginner".to_string()]),
            ..CourseChanges::default()
        };
        let details = content::edit_course(&db.pool, &media, &teacher, &course_id, changes, None, Some(1))
            .await
            .unwrap();

        assert_eq!(details.course.price, 10.0);
        assert_eq!(details.course.tag, vec!["beginner"]);
        assert_eq!(details.course.course_name, "Rust Basics");
        assert_eq!(details.course.version, 2);

        let stale = CourseChanges {
            course_name: Some("Renamed".to_string()),
            ..CourseChanges::default()
        };
        let result = content::edit_course(&db.pool, &media, &teacher, &course_id, stale, None, Some(1)).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let unchanged = courses::get_course(&db.pool, &course_id).await.unwrap();
        assert_eq!(unchanged.course_name, "Rust Basics");
    }

    #[tokio::test]
    async fn test_edit_course_replaces_thumbnail_and_enforces_rules() {
        let db = create_standard_test_db().await;
        let media = MemoryMediaStore::default();
        let teacher = db.session("teacher@example.com");
        let course_id = db.course_id("Rust Basics");

        let details = content::edit_course(
            &db.pool,
            &media,
            &teacher,
            &course_id,
            CourseChanges::default(),
            Some(upload("new.png", b"new")),
            None,
        )
        .await
        .unwrap();
        assert!(media.contains(&details.course.thumbnail_url));

        let second = content::edit_course(
            &db.pool,
            &media,
            &teacher,
            &course_id,
            CourseChanges::default(),
            Some(upload("newer.png", b"newer")),
            None,
        )
        .await
        .unwrap();
        assert!(!media.contains(&details.course.thumbnail_url));
        assert!(media.contains(&second.course.thumbnail_url));

        let published_without_tags = CourseChanges {
            tag: Some(Vec::new()),
            ..CourseChanges::default()
        };
        let result =
            content::edit_course(&db.pool, &media, &teacher, &course_id, published_without_tags, None, None)
                .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let other = db.session("other-teacher@example.com");
        let result =
            content::edit_course(&db.pool, &media, &other, &course_id, CourseChanges::default(), None, None)
                .await;
        assert!(matches!(result, Err(AppError::Authorization(_))));
    }

    #[tokio::test]
    async fn test_section_mutations_return_the_course() {
        let db = create_standard_test_db().await;
        let media = MemoryMediaStore::default();
        let teacher = db.session("teacher@example.com");
        let course_id = db.course_id("Rust Basics");

        let details = content::create_section(&db.pool, &teacher, &course_id, "Getting started")
            .await
            .unwrap();
        assert_eq!(details.course.id, course_id);
        assert_eq!(details.course_content.len(), 1);
        let first_id = details.course_content[0].id.clone();

        let details = content::create_section(&db.pool, &teacher, &course_id, "Ownership")
            .await
            .unwrap();
        let names: Vec<_> = details.course_content.iter().map(|s| s.section_name.as_str()).collect();
        assert_eq!(names, vec!["Getting started", "Ownership"]);

        let details = content::update_section(&db.pool, &teacher, &first_id, "Setup")
            .await
            .unwrap();
        assert_eq!(details.course_content[0].section_name, "Setup");

        let result = content::update_section(&db.pool, &teacher, &first_id, "   ").await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let details = content::delete_section(&db.pool, &media, &teacher, &first_id)
            .await
            .unwrap();
        assert_eq!(details.course_content.len(), 1);
        assert_eq!(details.course_content[0].section_name, "Ownership");
        assert!(details.course.version > 1);
    }

    #[tokio::test]
    async fn test_sub_section_lifecycle() {
        let db = create_standard_test_db().await;
        let media = MemoryMediaStore::default();
        let teacher = db.session("teacher@example.com");
        let course_id = db.course_id("Rust Basics");

        let details = content::create_section(&db.pool, &teacher, &course_id, "Intro")
            .await
            .unwrap();
        let section_id = details.course_content[0].id.clone();

        media.set_video_duration(Some(90.4));
        let input = SubSectionInput {
            title: Some("Hello".to_string()),
            description: Some("First lecture".to_string()),
            time_duration: Some(5.0),
        };
        let details = content::create_sub_section(
            &db.pool,
            &media,
            &teacher,
            &section_id,
            input,
            upload("hello.mp4", b"video"),
        )
        .await
        .unwrap();

        let lecture = details.course_content[0].sub_sections[0].clone();
        assert_eq!(lecture.time_duration_seconds, 90);
        assert_eq!(details.total_duration, "0h 1m 30s");
        assert!(media.contains(&lecture.video_url));

        media.set_video_duration(None);
        let details = content::update_sub_section(
            &db.pool,
            &media,
            &teacher,
            &lecture.id,
            SubSectionInput {
                title: Some("Hello again".to_string()),
                description: None,
                time_duration: Some(120.0),
            },
            Some(upload("again.mp4", b"video2")),
        )
        .await
        .unwrap();

        let updated = details.course_content[0].sub_sections[0].clone();
        assert_eq!(updated.title, "Hello again");
        assert_eq!(updated.description, "First lecture");
        assert_eq!(updated.time_duration_seconds, 120);
        assert!(!media.contains(&lecture.video_url));
        assert!(media.contains(&updated.video_url));

        let details = content::delete_sub_section(&db.pool, &media, &teacher, &lecture.id)
            .await
            .unwrap();
        assert!(details.course_content[0].sub_sections.is_empty());
        assert!(!media.contains(&updated.video_url));
    }

    #[tokio::test]
    async fn test_replacing_video_keeps_known_duration() {
        let db = create_standard_test_db().await;
        let media = MemoryMediaStore::default();
        let teacher = db.session("teacher@example.com");
        let (_, lectures) = db.add_section("Rust Basics", "Intro", 1, 600).await;

        let details = content::update_sub_section(
            &db.pool,
            &media,
            &teacher,
            &lectures[0].id,
            SubSectionInput::default(),
            Some(upload("re.mp4", b"new video")),
        )
        .await
        .unwrap();

        let lecture = &details.course_content[0].sub_sections[0];
        assert_eq!(lecture.time_duration_seconds, 600);
        assert_ne!(lecture.video_url, lectures[0].video_url);
        assert_eq!(details.total_duration, "0h 10m 0s");
    }

    #[tokio::test]
    async fn test_sub_section_without_any_duration_is_rejected() {
        let db = create_standard_test_db().await;
        let media = MemoryMediaStore::default();
        let teacher = db.session("teacher@example.com");
        let (section, _) = db.add_section("Rust Basics", "Intro", 0, 0).await;

        let result = content::create_sub_section(
            &db.pool,
            &media,
            &teacher,
            &section.id,
            SubSectionInput {
                title: Some("No length".to_string()),
                description: Some("Store cannot read it".to_string()),
                time_duration: None,
            },
            upload("v.mp4", b"v"),
        )
        .await;

        match result {
            Err(AppError::Validation(message)) => assert!(message.contains("timeDuration")),
            other => panic!("expected a validation error, got {:?}", other.map(|d| d.course.id)),
        }
        assert_eq!(media.len(), 0);
        assert!(sub_sections::sub_sections_for_section(&db.pool, &section.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_media_removed_before_rows_are_locked() {
        let db = create_standard_test_db().await;
        let media = LockAwareStore::new(db.pool.clone());
        let teacher = db.session("teacher@example.com");
        let course_id = db.course_id("Rust Basics");
        let (intro, _) = db.add_section("Rust Basics", "Intro", 2, 30).await;
        db.add_section("Rust Basics", "Advanced", 2, 30).await;

        content::delete_section(&db.pool, &media, &teacher, &intro.id)
            .await
            .unwrap();
        assert_eq!(media.deletes.load(Ordering::SeqCst), 2);

        content::delete_course(&db.pool, &media, &teacher, &course_id)
            .await
            .unwrap();
        assert_eq!(media.deletes.load(Ordering::SeqCst), 5);
        assert_eq!(media.deletes_while_busy.load(Ordering::SeqCst), 0);
        assert!(courses::find_course(&db.pool, &course_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sub_section_requires_title_and_description() {
        let db = create_standard_test_db().await;
        let media = MemoryMediaStore::default();
        let teacher = db.session("teacher@example.com");
        let (section, _) = db.add_section("Rust Basics", "Intro", 0, 0).await;

        let result = content::create_sub_section(
            &db.pool,
            &media,
            &teacher,
            &section.id,
            SubSectionInput::default(),
            upload("v.mp4", b"v"),
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(media.len(), 0);
    }

    #[tokio::test]
    async fn test_delete_course_cascades_content_and_media() {
        let db = create_standard_test_db().await;
        let media = MemoryMediaStore::default();
        let teacher = db.session("teacher@example.com");

        let details = content::create_course(
            &db.pool,
            &media,
            &teacher,
            course_input(&db.category_id("Programming")),
            upload("thumb.png", b"png"),
        )
        .await
        .unwrap();
        let course_id = details.course.id.clone();

        let mut video_urls = Vec::new();
        for section_name in ["One", "Two"] {
            let details = content::create_section(&db.pool, &teacher, &course_id, section_name)
                .await
                .unwrap();
            let section_id = details.course_content.last().unwrap().id.clone();
            for title in ["a", "b"] {
                let details = content::create_sub_section(
                    &db.pool,
                    &media,
                    &teacher,
                    &section_id,
                    SubSectionInput {
                        title: Some(title.to_string()),
                        description: Some("lecture".to_string()),
                        time_duration: Some(60.0),
                    },
                    upload("v.mp4", b"v"),
                )
                .await
                .unwrap();
                let section = details
                    .course_content
                    .iter()
                    .find(|s| s.id == section_id)
                    .unwrap();
                video_urls.push(section.sub_sections.last().unwrap().video_url.clone());
            }
        }
        assert_eq!(media.len(), 5);

        let other = db.session("other-teacher@example.com");
        let result = content::delete_course(&db.pool, &media, &other, &course_id).await;
        assert!(matches!(result, Err(AppError::Authorization(_))));

        content::delete_course(&db.pool, &media, &teacher, &course_id)
            .await
            .unwrap();

        assert!(courses::find_course(&db.pool, &course_id).await.unwrap().is_none());
        assert!(sections::sections_for_course(&db.pool, &course_id).await.unwrap().is_empty());
        assert!(sub_sections::sub_sections_for_course(&db.pool, &course_id).await.unwrap().is_empty());
        assert_eq!(media.len(), 0);
        for url in video_urls {
            assert!(!media.contains(&url));
        }
    }

    #[tokio::test]
    async fn test_media_cleanup_failure_does_not_block_delete() {
        let db = create_standard_test_db().await;
        let media = MemoryMediaStore::default();
        let teacher = db.session("teacher@example.com");
        let course_id = db.course_id("Rust Basics");
        db.add_section("Rust Basics", "Intro", 2, 30).await;

        media.set_failing_deletes(true);
        content::delete_course(&db.pool, &media, &teacher, &course_id)
            .await
            .unwrap();

        assert!(courses::find_course(&db.pool, &course_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deleting_category_keeps_courses() {
        let db = create_standard_test_db().await;
        let category_id = db.category_id("Programming");

        categories::delete_category(&db.pool, &category_id).await.unwrap();

        let course = courses::get_course(&db.pool, &db.course_id("Rust Basics")).await.unwrap();
        assert!(course.category_id.is_none());

        let result = categories::delete_category(&db.pool, &category_id).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
