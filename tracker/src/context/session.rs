//! Session-level context: one remote execution session (e.g. one browser or
//! worker instance), possibly shared across several method executions.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::method::MethodContext;
use crate::evidence::Video;

/// Sessions whose key starts with this prefix are exclusive to their owner
/// and are not handed out for reuse.
pub const EXCLUSIVE_PREFIX: &str = "EXCLUSIVE_";

/// Opaque descriptor from which a session is requested.
///
/// The session context clones it at construction so later mutation of the
/// caller's copy cannot corrupt report state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub session_key: String,
    pub browser_name: Option<String>,
    pub browser_version: Option<String>,
    #[serde(default)]
    pub capabilities: serde_json::Map<String, Value>,
}

impl SessionRequest {
    pub fn new(session_key: impl Into<String>) -> Self {
        Self {
            session_key: session_key.into(),
            browser_name: None,
            browser_version: None,
            capabilities: serde_json::Map::new(),
        }
    }
}

/// Location of the grid/node executing a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeInfo {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Context of one remote session.
///
/// Created when a new remote session is requested; mutated by the subsystem
/// managing the remote connection. Accumulates the method contexts that used
/// it over its lifetime; that list is append-only, identity-deduplicated and
/// safe for concurrent append from multiple method threads.
pub struct SessionContext {
    request: SessionRequest,
    name: RwLock<String>,
    remote_session_id: RwLock<Option<String>>,
    node_info: RwLock<Option<NodeInfo>>,
    browser_name: RwLock<Option<String>>,
    browser_version: RwLock<Option<String>>,
    capabilities: RwLock<Option<serde_json::Map<String, Value>>>,
    video: RwLock<Option<Video>>,
    methods: Mutex<Vec<Arc<MethodContext>>>,
    parent: RwLock<Weak<MethodContext>>,
}

impl SessionContext {
    /// Create a session context keyed by the request's session key. The
    /// request is defensively cloned.
    pub fn new(request: &SessionRequest) -> Arc<Self> {
        let request = request.clone();
        Arc::new(Self {
            name: RwLock::new(request.session_key.clone()),
            request,
            remote_session_id: RwLock::new(None),
            node_info: RwLock::new(None),
            browser_name: RwLock::new(None),
            browser_version: RwLock::new(None),
            capabilities: RwLock::new(None),
            video: RwLock::new(None),
            methods: Mutex::new(Vec::new()),
            parent: RwLock::new(Weak::new()),
        })
    }

    /// The request this session was created from, as it looked at creation.
    pub fn request(&self) -> &SessionRequest {
        &self.request
    }

    /// The session key is the session's name.
    pub fn session_key(&self) -> String {
        self.name.read().clone()
    }

    pub fn set_session_key(&self, session_key: impl Into<String>) {
        *self.name.write() = session_key.into();
    }

    pub fn is_exclusive(&self) -> bool {
        self.session_key().starts_with(EXCLUSIVE_PREFIX)
    }

    pub fn remote_session_id(&self) -> Option<String> {
        self.remote_session_id.read().clone()
    }

    pub fn set_remote_session_id(&self, session_id: impl Into<String>) {
        *self.remote_session_id.write() = Some(session_id.into());
    }

    pub fn node_info(&self) -> Option<NodeInfo> {
        self.node_info.read().clone()
    }

    pub fn set_node_info(&self, node_info: NodeInfo) {
        *self.node_info.write() = Some(node_info);
    }

    /// Browser name as reported by the running session, which may differ
    /// from the requested one.
    pub fn actual_browser_name(&self) -> Option<String> {
        self.browser_name.read().clone()
    }

    pub fn set_actual_browser_name(&self, name: impl Into<String>) {
        *self.browser_name.write() = Some(name.into());
    }

    pub fn actual_browser_version(&self) -> Option<String> {
        self.browser_version.read().clone()
    }

    pub fn set_actual_browser_version(&self, version: impl Into<String>) {
        *self.browser_version.write() = Some(version.into());
    }

    pub fn capabilities(&self) -> Option<serde_json::Map<String, Value>> {
        self.capabilities.read().clone()
    }

    pub fn set_capabilities(&self, capabilities: serde_json::Map<String, Value>) {
        *self.capabilities.write() = Some(capabilities);
    }

    pub fn video(&self) -> Option<Video> {
        self.video.read().clone()
    }

    pub fn set_video(&self, video: Video) {
        *self.video.write() = Some(video);
    }

    /// Append a method to the users of this session. Identity-deduplicated;
    /// safe for concurrent calls from different method threads.
    pub(crate) fn add_method_context(&self, method: &Arc<MethodContext>) {
        let mut methods = self.methods.lock();
        if !methods.iter().any(|existing| **existing == **method) {
            methods.push(Arc::clone(method));
        }
    }

    /// Snapshot of the methods that used this session, in first-use order.
    pub fn read_method_contexts(&self) -> Vec<Arc<MethodContext>> {
        self.methods.lock().clone()
    }

    /// The method currently owning this session, if still alive.
    pub fn parent_method(&self) -> Option<Arc<MethodContext>> {
        self.parent.read().upgrade()
    }

    pub(crate) fn set_parent(&self, method: &Arc<MethodContext>) {
        *self.parent.write() = Arc::downgrade(method);
    }
}
