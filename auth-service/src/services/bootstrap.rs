//! First-start seeding of the permission vocabulary, default roles and
//! optional demo branches.

use std::sync::Arc;

use super::store::RoleRepository;
use super::{BranchDirectory, PermissionModel, ServiceError};
use crate::config::BootstrapConfig;
use crate::models::{permission_codes as codes, NewBranch, Permission};

const PERMISSIONS: &[(&str, &str)] = &[
    (codes::USER_MANAGE, "Manage users"),
    (codes::USER_TOKEN_MANAGEMENT, "Manage user tokens"),
    (codes::TOKEN_INVALIDATE_OWN, "Invalidate own tokens"),
    (codes::TOKEN_INVALIDATE_USER, "Invalidate tokens of a specific user"),
    (codes::TOKEN_VIEW_OWN, "View own token version"),
    (codes::TOKEN_VIEW_USER, "View token version of a specific user"),
    (codes::ROLE_VIEW, "View roles"),
    (codes::ROLE_CREATE, "Create roles"),
    (codes::ROLE_UPDATE, "Update roles"),
    (codes::ROLE_DELETE, "Delete roles"),
    (codes::ROLE_UPDATE_PERMISSIONS, "Assign permissions to roles"),
    (codes::PERMISSION_VIEW, "View permissions"),
    (codes::PERMISSION_UPDATE, "Update permissions"),
    (codes::LOG_VIEW_ACTIVITY, "View user activity logs"),
    (codes::ADMIN_ACTIVITY_LOG_EXPORT, "Export user activity logs"),
    (codes::LOG_DELETE, "Delete user activity logs"),
    (codes::USER_VIEW_OWN_LOGIN_HISTORY, "View own login history"),
    (codes::BRANCH_VIEW, "View branches"),
    (codes::BRANCH_CREATE, "Create branches"),
    (codes::BRANCH_UPDATE, "Update branches"),
    (codes::BRANCH_DELETE, "Delete branches"),
    (codes::BRANCH_READ, "Read branch details"),
];

const MEMBER_PERMISSIONS: &[&str] = &[
    codes::USER_TOKEN_MANAGEMENT,
    codes::TOKEN_INVALIDATE_OWN,
    codes::TOKEN_VIEW_OWN,
    codes::USER_VIEW_OWN_LOGIN_HISTORY,
];

const TEACHER_PERMISSIONS: &[&str] = &[
    codes::USER_TOKEN_MANAGEMENT,
    codes::TOKEN_INVALIDATE_OWN,
    codes::TOKEN_VIEW_OWN,
    codes::USER_VIEW_OWN_LOGIN_HISTORY,
    codes::LOG_VIEW_ACTIVITY,
    codes::BRANCH_VIEW,
    codes::BRANCH_READ,
];

const STUDENT_PERMISSIONS: &[&str] = &[
    codes::TOKEN_INVALIDATE_OWN,
    codes::TOKEN_VIEW_OWN,
    codes::USER_VIEW_OWN_LOGIN_HISTORY,
    codes::BRANCH_VIEW,
    codes::BRANCH_READ,
];

pub const ADMIN_ROLE: &str = "ADMIN";

struct DemoBranch {
    name: &'static str,
    code: &'static str,
    address: &'static str,
    allowed_emails: &'static [&'static str],
}

const DEMO_BRANCHES: &[DemoBranch] = &[
    DemoBranch {
        name: "Ho Chi Minh Campus",
        code: "HCM",
        address: "590 Cach Mang Thang Tam, District 3, Ho Chi Minh City",
        allowed_emails: &[
            "anhcvdse182894@fpt.edu.vn",
            "teacher1@fpt.edu.vn",
            "admin.hcm@fpt.edu.vn",
            "student1@fe.edu.vn",
            "teacher1@fe.edu.vn",
        ],
    },
    DemoBranch {
        name: "Ha Noi Campus",
        code: "HN",
        address: "Hoa Lac Hi-Tech Park, Km 29, Dai Mo, Thach That, Hanoi",
        allowed_emails: &[
            "student.hn@fpt.edu.vn",
            "teacher.hn@fpt.edu.vn",
            "admin.hn@fpt.edu.vn",
            "student.hn@fe.edu.vn",
            "teacher.hn@fe.edu.vn",
        ],
    },
];

/// What a seeding run actually created.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub permissions_created: usize,
    pub roles_created: usize,
    pub branches_created: usize,
    pub allowed_emails_created: usize,
    pub admin_assigned: bool,
}

/// Seed defaults. Safe to run on every start.
///
/// Permissions and roles are only created when no permission exists yet;
/// demo branches are created when missing and each of their allow-list
/// emails is added unless already listed.
pub async fn seed_defaults(
    roles: Arc<dyn RoleRepository>,
    permissions: &PermissionModel,
    branches: &BranchDirectory,
    options: &BootstrapConfig,
) -> Result<SeedReport, ServiceError> {
    let mut report = SeedReport::default();

    if !options.seed_default_data {
        tracing::info!("Default data seeding disabled");
        return Ok(report);
    }

    if roles.list_permissions().await?.is_empty() {
        for (code, description) in PERMISSIONS {
            roles
                .insert_permission(&Permission::new(*code, *description))
                .await?;
            report.permissions_created += 1;
        }

        let all: Vec<String> = PERMISSIONS.iter().map(|(c, _)| c.to_string()).collect();
        let defaults: [(&str, Vec<String>); 4] = [
            (ADMIN_ROLE, all),
            ("MEMBER", owned(MEMBER_PERMISSIONS)),
            ("TEACHER", owned(TEACHER_PERMISSIONS)),
            ("STUDENT", owned(STUDENT_PERMISSIONS)),
        ];
        for (name, grants) in defaults {
            permissions.create_role(name, None, &grants).await?;
            report.roles_created += 1;
        }

        tracing::info!(
            permissions = report.permissions_created,
            roles = report.roles_created,
            "Initialized permissions and roles"
        );
    } else {
        tracing::info!("Permissions already exist, skipping initialization");
    }

    if options.seed_demo_branches {
        for demo in DEMO_BRANCHES {
            let branch = match branches.find_by_code(demo.code).await? {
                Some(existing) => existing,
                None => {
                    report.branches_created += 1;
                    branches
                        .create_branch(NewBranch {
                            name: demo.name.to_string(),
                            code: demo.code.to_string(),
                            address: demo.address.to_string(),
                            active: true,
                        })
                        .await?
                }
            };

            for email in demo.allowed_emails {
                match branches
                    .add_allowed_email(
                        branch.branch_id,
                        email,
                        Some(format!("{} demo account", demo.code)),
                    )
                    .await
                {
                    Ok(_) => report.allowed_emails_created += 1,
                    Err(ServiceError::Conflict(_)) => {}
                    Err(e) => return Err(e),
                }
            }
        }
    }

    if let Some(admin_email) = options.admin_email.as_deref() {
        match roles.find_role_by_name(ADMIN_ROLE).await? {
            Some(admin) => {
                permissions.assign_role(admin_email, admin.role_id).await?;
                report.admin_assigned = true;
                tracing::info!("Bootstrap administrator holds the ADMIN role");
            }
            None => tracing::warn!("ADMIN role missing, bootstrap administrator not assigned"),
        }
    }

    Ok(report)
}

fn owned(codes: &[&str]) -> Vec<String> {
    codes.iter().map(|c| c.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{EmailAuthorizationEngine, InMemoryStore};

    fn options() -> BootstrapConfig {
        BootstrapConfig {
            seed_default_data: true,
            seed_demo_branches: true,
            admin_email: Some("Admin.HCM@fpt.edu.vn".to_string()),
        }
    }

    #[tokio::test]
    async fn test_seed_creates_vocabulary_roles_and_branches() {
        let store = Arc::new(InMemoryStore::new());
        let model = PermissionModel::new(store.clone());
        let directory = BranchDirectory::new(store.clone());

        let report = seed_defaults(store.clone(), &model, &directory, &options())
            .await
            .unwrap();
        assert_eq!(report.permissions_created, 22);
        assert_eq!(report.roles_created, 4);
        assert_eq!(report.branches_created, 2);
        assert_eq!(report.allowed_emails_created, 10);
        assert!(report.admin_assigned);

        let admin = model.effective_permissions("admin.hcm@fpt.edu.vn").await.unwrap();
        assert_eq!(admin.len(), 22);

        let roles = model.list_roles().await.unwrap();
        let student = roles.iter().find(|r| r.name == "STUDENT").unwrap();
        assert!(student.grants(codes::BRANCH_READ));
        assert!(!student.grants(codes::USER_TOKEN_MANAGEMENT));
        let teacher = roles.iter().find(|r| r.name == "TEACHER").unwrap();
        assert!(teacher.grants(codes::LOG_VIEW_ACTIVITY));

        let engine = EmailAuthorizationEngine::new(store);
        assert!(engine.validate_email_for_branch("student1@fe.edu.vn", "HCM").await);
        assert!(engine.validate_email_for_branch("student.hn@fe.edu.vn", "HN").await);
        assert!(!engine.validate_email_for_branch("student1@fe.edu.vn", "HN").await);
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = Arc::new(InMemoryStore::new());
        let model = PermissionModel::new(store.clone());
        let directory = BranchDirectory::new(store.clone());

        seed_defaults(store.clone(), &model, &directory, &options())
            .await
            .unwrap();
        let second = seed_defaults(store.clone(), &model, &directory, &options())
            .await
            .unwrap();

        assert_eq!(second.permissions_created, 0);
        assert_eq!(second.roles_created, 0);
        assert_eq!(second.branches_created, 0);
        assert_eq!(second.allowed_emails_created, 0);
        assert_eq!(model.list_roles().await.unwrap().len(), 4);
        assert_eq!(directory.find_active_branches().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_seeding_disabled_creates_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let model = PermissionModel::new(store.clone());
        let directory = BranchDirectory::new(store.clone());
        let disabled = BootstrapConfig {
            seed_default_data: false,
            ..options()
        };

        let report = seed_defaults(store, &model, &directory, &disabled)
            .await
            .unwrap();
        assert_eq!(report, SeedReport::default());
        assert!(model.list_permissions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_existing_demo_branch_gets_missing_emails() {
        let store = Arc::new(InMemoryStore::new());
        let model = PermissionModel::new(store.clone());
        let directory = BranchDirectory::new(store.clone());

        let hcm = directory
            .create_branch(NewBranch {
                name: "Ho Chi Minh Campus".to_string(),
                code: "HCM".to_string(),
                address: "District 3".to_string(),
                active: true,
            })
            .await
            .unwrap();
        directory
            .add_allowed_email(hcm.branch_id, "teacher1@fe.edu.vn", None)
            .await
            .unwrap();

        let report = seed_defaults(store, &model, &directory, &options())
            .await
            .unwrap();

        assert_eq!(report.branches_created, 1);
        assert_eq!(report.allowed_emails_created, 9);
        let emails = directory.list_allowed_emails(hcm.branch_id).await.unwrap();
        assert_eq!(emails.len(), 5);
        assert!(emails.contains(&"student1@fe.edu.vn".to_string()));
    }
}
