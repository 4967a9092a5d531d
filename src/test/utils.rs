#[cfg(test)]
pub mod test_utils {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex, Once};

    use async_trait::async_trait;
    use rocket::http::{ContentType, Header};
    use rocket::local::asynchronous::Client;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};
    use uuid::Uuid;

    use crate::auth::password::hash_password;
    use crate::auth::token::issue_token;
    use crate::auth::{AccountType, SessionUser, User};
    use crate::clients::{MailService, MediaService, MediaStore, MediaUpload, Mailer, StoredMedia};
    use crate::database::courses::NewCourse;
    use crate::database::sub_sections::NewSubSection;
    use crate::database::{categories, courses, sections, sub_sections, users};
    use crate::env::AppConfig;
    use crate::error::AppError;
    use crate::models::{Course, CourseStatus, Section, SubSection};

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    pub fn test_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "test-secret".to_string(),
            token_ttl_hours: 1,
            otp_ttl_minutes: 5,
            otp_sweep_interval_secs: 3600,
            expose_otp: true,
            bcrypt_cost: 4,
            media_root: PathBuf::from("target/test-media-not-served"),
            media_base_url: "memory://media".to_string(),
            media_folder: "course-hub".to_string(),
            smtp: None,
        }
    }

    #[derive(Debug, Clone)]
    pub struct SentMail {
        pub to: String,
        pub subject: String,
        pub body: String,
    }

    /// Keeps every message instead of sending it. `fail` makes the next sends error.
    #[derive(Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<SentMail>>,
        fail: AtomicBool,
    }

    impl RecordingMailer {
        pub fn set_failing(&self, failing: bool) {
            self.fail.store(failing, Ordering::SeqCst);
        }

        pub fn sent(&self) -> Vec<SentMail> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send_mail(&self, to: &str, subject: &str, html_body: &str) -> Result<(), AppError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(AppError::ExternalService("mail relay unavailable".to_string()));
            }
            self.sent.lock().unwrap().push(SentMail {
                to: to.to_string(),
                subject: subject.to_string(),
                body: html_body.to_string(),
            });
            Ok(())
        }
    }

    /// Media store backed by a map of url to size.
    #[derive(Default)]
    pub struct MemoryMediaStore {
        files: Mutex<HashMap<String, usize>>,
        fail_uploads: AtomicBool,
        fail_deletes: AtomicBool,
        video_duration: Mutex<Option<f64>>,
    }

    impl MemoryMediaStore {
        pub fn contains(&self, url: &str) -> bool {
            self.files.lock().unwrap().contains_key(url)
        }

        pub fn len(&self) -> usize {
            self.files.lock().unwrap().len()
        }

        pub fn set_failing_uploads(&self, failing: bool) {
            self.fail_uploads.store(failing, Ordering::SeqCst);
        }

        pub fn set_failing_deletes(&self, failing: bool) {
            self.fail_deletes.store(failing, Ordering::SeqCst);
        }

        pub fn set_video_duration(&self, seconds: Option<f64>) {
            *self.video_duration.lock().unwrap() = seconds;
        }
    }

    #[async_trait]
    impl MediaStore for MemoryMediaStore {
        async fn upload(&self, upload: MediaUpload) -> Result<StoredMedia, AppError> {
            if self.fail_uploads.load(Ordering::SeqCst) {
                return Err(AppError::ExternalService("media store unavailable".to_string()));
            }
            let url = format!(
                "memory://media/{}/{}-{}",
                upload.folder,
                Uuid::new_v4(),
                upload.file_name
            );
            self.files.lock().unwrap().insert(url.clone(), upload.bytes.len());
            Ok(StoredMedia {
                secure_url: url,
                duration_seconds: *self.video_duration.lock().unwrap(),
            })
        }

        async fn delete(&self, url: &str) -> Result<(), AppError> {
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(AppError::ExternalService("media store unavailable".to_string()));
            }
            self.files.lock().unwrap().remove(url);
            Ok(())
        }
    }

    pub fn upload(name: &str, bytes: &[u8]) -> MediaUpload {
        MediaUpload {
            bytes: bytes.to_vec(),
            file_name: name.to_string(),
            folder: "course-hub".to_string(),
        }
    }

    pub struct TestUser {
        pub first_name: String,
        pub last_name: String,
        pub email: String,
        pub account_type: AccountType,
    }

    pub struct TestCourse {
        pub name: String,
        pub instructor_email: String,
        pub category_name: Option<String>,
        pub price: f64,
        pub status: CourseStatus,
    }

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        categories: Vec<String>,
        courses: Vec<TestCourse>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        fn user(mut self, email: &str, account_type: AccountType) -> Self {
            let local = email.split('@').next().unwrap_or(email);
            self.users.push(TestUser {
                first_name: local.to_string(),
                last_name: "Tester".to_string(),
                email: email.to_string(),
                account_type,
            });
            self
        }

        pub fn student(self, email: &str) -> Self {
            self.user(email, AccountType::Student)
        }

        pub fn instructor(self, email: &str) -> Self {
            self.user(email, AccountType::Instructor)
        }

        pub fn admin(self, email: &str) -> Self {
            self.user(email, AccountType::Admin)
        }

        pub fn category(mut self, name: &str) -> Self {
            self.categories.push(name.to_string());
            self
        }

        pub fn course(
            mut self,
            name: &str,
            instructor_email: &str,
            category_name: Option<&str>,
            status: CourseStatus,
        ) -> Self {
            self.courses.push(TestCourse {
                name: name.to_string(),
                instructor_email: instructor_email.to_string(),
                category_name: category_name.map(String::from),
                price: 100.0,
                status,
            });
            self
        }

        pub fn published_course(self, name: &str, instructor_email: &str, category_name: &str) -> Self {
            self.course(name, instructor_email, Some(category_name), CourseStatus::Published)
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::Builder::from_env(
                    env_logger::Env::default().default_filter_or("debug"),
                )
                .is_test(true)
                .try_init();
            });

            // One connection keeps every query on the same in-memory database.
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            let digest = hash_password(STANDARD_PASSWORD, 4)?;
            let mut user_map = HashMap::new();
            for user in &self.users {
                let created = users::insert_user(
                    &pool,
                    &users::NewUser {
                        first_name: &user.first_name,
                        last_name: &user.last_name,
                        email: &user.email,
                        password_digest: &digest,
                        account_type: user.account_type,
                        image_url: "memory://media/avatars/default.png",
                    },
                )
                .await?;
                users::insert_profile(&pool, &created.id, None).await?;
                user_map.insert(user.email.clone(), created);
            }

            let mut category_map = HashMap::new();
            for name in &self.categories {
                let category =
                    categories::create_category(&pool, name, &format!("All about {}", name)).await?;
                category_map.insert(name.clone(), category.id);
            }

            let mut course_map = HashMap::new();
            for course in &self.courses {
                let instructor = user_map.get(&course.instructor_email).ok_or_else(|| {
                    AppError::NotFound(format!("test user {}", course.instructor_email))
                })?;
                let category_id = course
                    .category_name
                    .as_ref()
                    .and_then(|name| category_map.get(name).cloned());

                let created = courses::insert_course(
                    &pool,
                    &NewCourse {
                        course_name: course.name.clone(),
                        course_description: format!("{} description", course.name),
                        instructor_id: instructor.id.clone(),
                        what_you_will_learn: "Everything".to_string(),
                        price: course.price,
                        thumbnail_url: format!("memory://media/thumbs/{}.png", course.name),
                        category_id,
                        tag: vec!["rust".to_string()],
                        instructions: vec!["Bring a laptop".to_string()],
                        status: course.status,
                    },
                )
                .await?;
                course_map.insert(course.name.clone(), created);
            }

            Ok(TestDb {
                pool,
                users: user_map,
                categories: category_map,
                courses: course_map,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub users: HashMap<String, User>,
        pub categories: HashMap<String, String>,
        pub courses: HashMap<String, Course>,
    }

    impl TestDb {
        pub fn user(&self, email: &str) -> &User {
            &self.users[email]
        }

        pub fn session(&self, email: &str) -> SessionUser {
            let user = self.user(email);
            SessionUser {
                id: user.id.clone(),
                email: user.email.clone(),
                account_type: user.account_type,
            }
        }

        pub fn category_id(&self, name: &str) -> String {
            self.categories[name].clone()
        }

        pub fn course_id(&self, name: &str) -> String {
            self.courses[name].id.clone()
        }

        /// Adds a section with `videos` lectures of `seconds` each, directly in the store.
        pub async fn add_section(
            &self,
            course_name: &str,
            section_name: &str,
            videos: usize,
            seconds: i64,
        ) -> (Section, Vec<SubSection>) {
            let section = sections::insert_section(&self.pool, &self.course_id(course_name), section_name)
                .await
                .unwrap();

            let mut created = Vec::new();
            for i in 0..videos {
                let sub_section = sub_sections::insert_sub_section(
                    &self.pool,
                    &NewSubSection {
                        section_id: section.id.clone(),
                        title: format!("{} lecture {}", section_name, i + 1),
                        description: "Watch this".to_string(),
                        time_duration_seconds: seconds,
                        video_url: format!("memory://media/videos/{}-{}.mp4", section.id, i),
                    },
                )
                .await
                .unwrap();
                created.push(sub_section);
            }

            (section, created)
        }
    }

    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .student("student@example.com")
            .student("second@example.com")
            .instructor("teacher@example.com")
            .instructor("other-teacher@example.com")
            .admin("admin@example.com")
            .category("Programming")
            .category("Design")
            .published_course("Rust Basics", "teacher@example.com", "Programming")
            .course(
                "Draft Course",
                "teacher@example.com",
                Some("Programming"),
                CourseStatus::Draft,
            )
            .build()
            .await
            .expect("Failed to build test database")
    }

    pub struct TestContext {
        pub db: TestDb,
        pub config: AppConfig,
        pub mailer: Arc<RecordingMailer>,
        pub media: Arc<MemoryMediaStore>,
    }

    impl TestContext {
        pub fn bearer(&self, email: &str) -> Header<'static> {
            let token = issue_token(&self.config, self.db.user(email)).unwrap().token;
            Header::new("Authorization", format!("Bearer {}", token))
        }
    }

    pub async fn setup_test_client(db: TestDb) -> (Client, TestContext) {
        let config = test_config();
        let mailer = Arc::new(RecordingMailer::default());
        let media = Arc::new(MemoryMediaStore::default());

        let rocket = crate::init_rocket(
            db.pool.clone(),
            config.clone(),
            mailer.clone() as MailService,
            media.clone() as MediaService,
        )
        .expect("rocket should build");

        let client = Client::tracked(rocket).await.expect("valid rocket instance");

        (
            client,
            TestContext {
                db,
                config,
                mailer,
                media,
            },
        )
    }

    const BOUNDARY: &str = "course-hub-test-boundary";

    /// Hand-built `multipart/form-data` body for upload endpoints.
    #[derive(Default)]
    pub struct MultipartBody {
        body: Vec<u8>,
    }

    impl MultipartBody {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn text(mut self, name: &str, value: &str) -> Self {
            self.body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
            self
        }

        pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
            self.body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                    BOUNDARY, name, file_name, content_type
                )
                .as_bytes(),
            );
            self.body.extend_from_slice(bytes);
            self.body.extend_from_slice(b"\r\n");
            self
        }

        pub fn finish(mut self) -> (ContentType, Vec<u8>) {
            self.body
                .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
            let content_type = ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY));
            (content_type, self.body)
        }
    }
}
