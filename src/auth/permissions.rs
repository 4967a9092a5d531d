use anyhow::Error;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewOwnProfile,
    EditOwnProfile,

    EnrollInCourses,
    TrackProgress,
    ReviewCourses,

    CreateCourses,
    ManageOwnCourses,
    ViewInstructorDashboard,

    ManageCategories,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    Student,
    Instructor,
    Admin,
}

static ACCOUNT_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.insert(Permission::ViewOwnProfile);
    permissions.insert(Permission::EditOwnProfile);

    permissions
});

static STUDENT_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(ACCOUNT_PERMISSIONS.iter().copied());

    permissions.insert(Permission::EnrollInCourses);
    permissions.insert(Permission::TrackProgress);
    permissions.insert(Permission::ReviewCourses);

    permissions
});

static INSTRUCTOR_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(ACCOUNT_PERMISSIONS.iter().copied());

    permissions.insert(Permission::CreateCourses);
    permissions.insert(Permission::ManageOwnCourses);
    permissions.insert(Permission::ViewInstructorDashboard);

    permissions
});

// Admins curate the catalogue structure but do not author or take courses.
static ADMIN_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(ACCOUNT_PERMISSIONS.iter().copied());

    permissions.insert(Permission::ManageCategories);

    permissions
});

impl AccountType {
    pub fn permissions(&self) -> &'static HashSet<Permission> {
        match self {
            AccountType::Student => &STUDENT_PERMISSIONS,
            AccountType::Instructor => &INSTRUCTOR_PERMISSIONS,
            AccountType::Admin => &ADMIN_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Student => "Student",
            AccountType::Instructor => "Instructor",
            AccountType::Admin => "Admin",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "Student" => Ok(AccountType::Student),
            "Instructor" => Ok(AccountType::Instructor),
            "Admin" => Ok(AccountType::Admin),
            _ => Err(Error::msg(format!("Unknown account type: {}", s))),
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
