//! Result aggregation.
//!
//! Rendering folds settled results into one string and never waits on
//! anything: it always walks children in declared order, whatever order they
//! finished in.

use canopy_task::Container;

use crate::instance::{InstanceId, InstanceTree};

/// Render a composite from its children's settled results, wrapped in the
/// composite's own container.
pub fn render(tree: &InstanceTree, id: InstanceId) -> String {
  let instance = tree.get(id);
  let parts = instance
    .children()
    .iter()
    .map(|&child| tree.get(child).result().unwrap_or_default());
  wrap(instance.container(), parts)
}

/// Render a leaf from the fragment its work produced.
pub fn render_leaf(container: Option<&Container>, fragment: &str) -> String {
  wrap(container, [fragment])
}

fn wrap<'a>(container: Option<&Container>, parts: impl IntoIterator<Item = &'a str>) -> String {
  match container {
    Some(container) => container.wrap(parts),
    None => parts.into_iter().collect(),
  }
}
