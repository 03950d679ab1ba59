use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{error, info, warn};

use super::context::RunContext;
use crate::remote::{NodeKind, RemoteNode};
use crate::utils::sanitize::{disambiguate, sanitize_file_name};

/// Depth-first walk of a remote directory tree.
///
/// Listing is sequential; every file found is handed to the transfer pool
/// and the walk moves on without waiting for it.
pub struct TreeWalker {
    ctx: Arc<RunContext>,
    visited: HashSet<String>,
}

impl TreeWalker {
    pub fn new(ctx: Arc<RunContext>) -> Self {
        TreeWalker {
            ctx,
            visited: HashSet::new(),
        }
    }

    /// Mirrors the already listed `children` of `dir_id` into `local_dir`.
    ///
    /// Siblings whose names collide after sanitizing keep the first-listed
    /// one under the plain name; the others get their id appended.
    pub async fn walk(&mut self, dir_id: &str, children: Vec<RemoteNode>, local_dir: &Path) {
        self.visited.insert(dir_id.to_string());
        let mut claimed = HashSet::new();
        for child in children {
            let mut name = sanitize_file_name(&child.name, &child.id);
            if claimed.contains(&name) {
                let unique = disambiguate(&name, &child.id);
                warn!(
                    id = %child.id,
                    name = %child.name,
                    local = %unique,
                    "name taken by a sibling, renaming"
                );
                name = unique;
            }
            claimed.insert(name.clone());
            let local = local_dir.join(&name);
            match child.kind {
                NodeKind::Directory => self.descend(child, local).await,
                NodeKind::File => self.ctx.dispatch(child, local).await,
            }
        }
    }

    async fn descend(&mut self, dir: RemoteNode, local_dir: PathBuf) {
        if self.visited.contains(&dir.id) {
            warn!(id = %dir.id, name = %dir.name, "directory already visited, skipping");
            return;
        }
        if let Err(err) = tokio::fs::create_dir_all(&local_dir).await {
            error!(
                path = %local_dir.display(),
                error = %err,
                "cannot create directory, skipping subtree"
            );
            return;
        }
        self.traverse(dir, local_dir).await;
    }

    fn traverse(&mut self, dir: RemoteNode, local_dir: PathBuf) -> BoxFuture<'_, ()> {
        async move {
            let children = match self.ctx.client.list_children(&dir.id).await {
                Ok(children) => children,
                Err(err) => {
                    error!(
                        id = %dir.id,
                        name = %dir.name,
                        error = %err,
                        "listing failed, skipping subtree"
                    );
                    self.visited.insert(dir.id);
                    return;
                }
            };
            if children.is_empty() {
                info!(name = %dir.name, "empty directory");
            }
            self.walk(&dir.id, children, &local_dir).await;
        }
        .boxed()
    }
}
