//! Route table
//!
//! An ordered list of views with their static access requirements. Patterns support
//! `:param` (exactly one segment) and `:param*` (the rest of the path, possibly empty).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Static access requirements of a view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteAccessMeta {
    /// Renders without a session
    #[serde(default)]
    pub public: bool,
    /// Requires an admin session
    #[serde(default)]
    pub admin_only: bool,
}

impl RouteAccessMeta {
    pub const fn public() -> Self {
        Self {
            public: true,
            admin_only: false,
        }
    }

    pub const fn authenticated() -> Self {
        Self {
            public: false,
            admin_only: false,
        }
    }

    pub const fn admin_only() -> Self {
        Self {
            public: false,
            admin_only: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub meta: RouteAccessMeta,
}

impl RouteRecord {
    pub fn new(path: &str, name: &str, meta: RouteAccessMeta) -> Self {
        Self {
            path: path.to_string(),
            name: name.to_string(),
            title: None,
            meta,
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }
}

/// A path matched against the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute<'a> {
    pub record: &'a RouteRecord,
    /// Normalized path without query or fragment
    pub path: String,
    pub params: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTable {
    routes: Vec<RouteRecord>,
}

impl RouteTable {
    pub fn new(routes: Vec<RouteRecord>) -> Self {
        Self { routes }
    }

    /// The admin console's views
    pub fn admin_console(login_path: &str, home_path: &str) -> Self {
        Self::new(vec![
            RouteRecord::new(login_path, "login", RouteAccessMeta::public()).with_title("Login"),
            RouteRecord::new(home_path, "home", RouteAccessMeta::authenticated()).with_title("Home"),
            RouteRecord::new("/tools", "tools", RouteAccessMeta::authenticated())
                .with_title("MCP Tools"),
            RouteRecord::new("/mcp", "mcp", RouteAccessMeta::authenticated())
                .with_title("MCP Service Status"),
            RouteRecord::new("/resources", "resources", RouteAccessMeta::authenticated())
                .with_title("MCP Resources"),
            RouteRecord::new("/protocols", "protocols", RouteAccessMeta::authenticated())
                .with_title("MCP Protocols"),
            RouteRecord::new("/marketplace", "marketplace", RouteAccessMeta::authenticated())
                .with_title("Marketplace"),
            RouteRecord::new("/editor/:path*", "editor", RouteAccessMeta::authenticated()),
            RouteRecord::new("/users", "users", RouteAccessMeta::admin_only())
                .with_title("User Management"),
            RouteRecord::new("/tenants", "tenants", RouteAccessMeta::admin_only())
                .with_title("Tenant Management"),
        ])
    }

    pub fn push(&mut self, record: RouteRecord) {
        self.routes.push(record);
    }

    pub fn routes(&self) -> &[RouteRecord] {
        &self.routes
    }

    pub fn by_name(&self, name: &str) -> Option<&RouteRecord> {
        self.routes.iter().find(|r| r.name == name)
    }

    /// First route whose pattern matches `path`
    pub fn resolve(&self, path: &str) -> Option<ResolvedRoute<'_>> {
        let path = normalize(path);
        self.routes.iter().find_map(|record| {
            match_pattern(&record.path, &path).map(|params| ResolvedRoute {
                record,
                path: path.clone(),
                params,
            })
        })
    }
}

fn normalize(path: &str) -> String {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let trimmed = path[..end].trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn match_pattern(pattern: &str, path: &str) -> Option<HashMap<String, String>> {
    let pattern_segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let mut params = HashMap::new();

    for (i, segment) in pattern_segments.iter().enumerate() {
        if let Some(name) = segment.strip_prefix(':') {
            if let Some(name) = name.strip_suffix('*') {
                let rest = path_segments.get(i..).unwrap_or(&[]).join("/");
                params.insert(name.to_string(), rest);
                return Some(params);
            }
            let value = path_segments.get(i)?;
            params.insert(name.to_string(), value.to_string());
        } else if path_segments.get(i) != Some(segment) {
            return None;
        }
    }

    (pattern_segments.len() == path_segments.len()).then_some(params)
}
