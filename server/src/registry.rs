//! Method name lookup for incoming messages.

use std::collections::HashMap;

use thiserror::Error;

/// Methods answered with a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestMethod {
    Initialize,
    Shutdown,
    BuildTargets,
    Sources,
    InverseSources,
    Prepare,
    RegisterForChanges,
    SourceKitOptions,
    WaitForBuildSystemUpdates,
}

impl RequestMethod {
    pub const ALL: [RequestMethod; 9] = [
        RequestMethod::Initialize,
        RequestMethod::Shutdown,
        RequestMethod::BuildTargets,
        RequestMethod::Sources,
        RequestMethod::InverseSources,
        RequestMethod::Prepare,
        RequestMethod::RegisterForChanges,
        RequestMethod::SourceKitOptions,
        RequestMethod::WaitForBuildSystemUpdates,
    ];

    #[must_use]
    pub const fn method(self) -> &'static str {
        match self {
            RequestMethod::Initialize => "build/initialize",
            RequestMethod::Shutdown => "build/shutdown",
            RequestMethod::BuildTargets => "workspace/buildTargets",
            RequestMethod::Sources => "buildTarget/sources",
            RequestMethod::InverseSources => "buildTarget/inverseSources",
            RequestMethod::Prepare => "buildTarget/prepare",
            RequestMethod::RegisterForChanges => "textDocument/registerForChanges",
            RequestMethod::SourceKitOptions => "textDocument/sourceKitOptions",
            RequestMethod::WaitForBuildSystemUpdates => "workspace/waitForBuildSystemUpdates",
        }
    }
}

/// Methods that never get a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationMethod {
    Initialized,
    Exit,
    DidChangeWatchedFiles,
}

impl NotificationMethod {
    pub const ALL: [NotificationMethod; 3] = [
        NotificationMethod::Initialized,
        NotificationMethod::Exit,
        NotificationMethod::DidChangeWatchedFiles,
    ];

    #[must_use]
    pub const fn method(self) -> &'static str {
        match self {
            NotificationMethod::Initialized => "build/initialized",
            NotificationMethod::Exit => "build/exit",
            NotificationMethod::DidChangeWatchedFiles => "workspace/didChangeWatchedFiles",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Request(RequestMethod),
    Notification(NotificationMethod),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate method registration: {method}")]
    Duplicate { method: &'static str },
}

/// Method name to handler kind, built once at startup.
#[derive(Debug)]
pub struct MethodRegistry {
    methods: HashMap<&'static str, MethodKind>,
}

impl MethodRegistry {
    pub fn new(
        requests: &[RequestMethod],
        notifications: &[NotificationMethod],
    ) -> Result<Self, RegistryError> {
        let mut methods = HashMap::with_capacity(requests.len() + notifications.len());

        for request in requests {
            let method = request.method();
            if methods.insert(method, MethodKind::Request(*request)).is_some() {
                return Err(RegistryError::Duplicate { method });
            }
        }

        for notification in notifications {
            let method = notification.method();
            if methods
                .insert(method, MethodKind::Notification(*notification))
                .is_some()
            {
                return Err(RegistryError::Duplicate { method });
            }
        }

        Ok(Self { methods })
    }

    /// Every request and notification the server implements.
    pub fn standard() -> Result<Self, RegistryError> {
        Self::new(&RequestMethod::ALL, &NotificationMethod::ALL)
    }

    #[must_use]
    pub fn lookup(&self, method: &str) -> Option<MethodKind> {
        self.methods.get(method).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
