// ── Endpoint catalog ──
//
// Top-level platform collections that share the generic
// list / info / create / edit endpoint shape.

/// A top-level platform collection with the standard CRUD endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Device,
    Analysis,
    Dashboard,
    AccessPolicy,
    Action,
    Network,
    Connector,
    Dictionary,
    RunUser,
    Secret,
}

impl Resource {
    /// Base path of the collection, relative to the API root.
    pub fn path(self) -> &'static str {
        match self {
            Self::Device => "device",
            Self::Analysis => "analysis",
            Self::Dashboard => "dashboard",
            Self::AccessPolicy => "am",
            Self::Action => "action",
            Self::Network => "integration/network",
            Self::Connector => "integration/connector",
            Self::Dictionary => "dictionary",
            Self::RunUser => "run/users",
            Self::Secret => "secrets",
        }
    }

    /// Field of the create response that carries the new id.
    ///
    /// The platform is inconsistent here: most collections answer with
    /// `{"<singular>": "<id>"}`, a few with a plain `id`.
    pub fn created_id_field(self) -> &'static str {
        match self {
            Self::Device => "device_id",
            Self::Analysis | Self::Secret => "id",
            Self::Dashboard => "dashboard",
            Self::AccessPolicy => "am",
            Self::Action => "action",
            Self::Network => "network",
            Self::Connector => "connector",
            Self::Dictionary => "dictionary",
            Self::RunUser => "user",
        }
    }

    /// Human-readable singular name, used in logs and error context.
    pub fn label(self) -> &'static str {
        match self {
            Self::Device => "device",
            Self::Analysis => "analysis",
            Self::Dashboard => "dashboard",
            Self::AccessPolicy => "access policy",
            Self::Action => "action",
            Self::Network => "network",
            Self::Connector => "connector",
            Self::Dictionary => "dictionary",
            Self::RunUser => "run user",
            Self::Secret => "secret",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Resource;

    #[test]
    fn nested_collections_keep_their_prefix() {
        assert_eq!(Resource::Network.path(), "integration/network");
        assert_eq!(Resource::RunUser.path(), "run/users");
    }

    #[test]
    fn device_create_answers_with_device_id() {
        assert_eq!(Resource::Device.created_id_field(), "device_id");
        assert_eq!(Resource::Secret.created_id_field(), "id");
    }
}
