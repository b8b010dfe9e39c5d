use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Finance,
    ContentManager,
    CustomerService,
    User,
    Guest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewProperties,
    ManageProperties,
    /// Manage every building, not only the ones assigned to the caller.
    ManageAllProperties,
    ViewReadings,
    RecordReadings,
    ViewBills,
    ManageBills,
    RunBillingJobs,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ViewProperties => "view_properties",
            Self::ManageProperties => "manage_properties",
            Self::ManageAllProperties => "manage_all_properties",
            Self::ViewReadings => "view_readings",
            Self::RecordReadings => "record_readings",
            Self::ViewBills => "view_bills",
            Self::ManageBills => "manage_bills",
            Self::RunBillingJobs => "run_billing_jobs",
        }
    }
}

const ALL_CAPABILITIES: &[Capability] = &[
    Capability::ViewProperties,
    Capability::ManageProperties,
    Capability::ManageAllProperties,
    Capability::ViewReadings,
    Capability::RecordReadings,
    Capability::ViewBills,
    Capability::ManageBills,
    Capability::RunBillingJobs,
];

impl Role {
    /// Parses the role names carried in tokens and dev headers. Accepts
    /// `super_admin`, `SUPER_ADMIN` and `super-admin` alike.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "super_admin" => Some(Self::SuperAdmin),
            "admin" => Some(Self::Admin),
            "finance" => Some(Self::Finance),
            "content_manager" => Some(Self::ContentManager),
            "customer_service" => Some(Self::CustomerService),
            "user" => Some(Self::User),
            "guest" => Some(Self::Guest),
            _ => None,
        }
    }

    pub fn grants(self) -> &'static [Capability] {
        match self {
            Self::SuperAdmin | Self::Admin => ALL_CAPABILITIES,
            Self::Finance => &[
                Capability::ViewProperties,
                Capability::ViewReadings,
                Capability::ViewBills,
                Capability::ManageBills,
                Capability::RunBillingJobs,
            ],
            Self::ContentManager => &[
                Capability::ViewProperties,
                Capability::ManageProperties,
                Capability::ViewReadings,
                Capability::RecordReadings,
            ],
            Self::CustomerService => &[
                Capability::ViewProperties,
                Capability::ViewReadings,
                Capability::ViewBills,
            ],
            Self::User => &[Capability::ViewProperties, Capability::ViewBills],
            Self::Guest => &[],
        }
    }
}

/// Parses a role list, dropping names that are not recognised.
pub fn parse_roles<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<Role> {
    let mut roles = Vec::new();
    for role in raw.into_iter().filter_map(Role::parse) {
        if !roles.contains(&role) {
            roles.push(role);
        }
    }
    roles
}

pub fn has_capability(roles: &[Role], capability: Capability) -> bool {
    roles.iter().any(|role| role.grants().contains(&capability))
}
