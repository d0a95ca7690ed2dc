/// Markers a node wraps around its rendered output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Container {
  open: String,
  close: String,
}

impl Container {
  pub const DEFAULT_TAG: &'static str = "div";

  pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
    Self {
      open: open.into(),
      close: close.into(),
    }
  }

  /// Element-style markers, e.g. `tag("ul")` is `<ul>` / `</ul>`.
  pub fn tag(name: &str) -> Self {
    Self::new(format!("<{}>", name), format!("</{}>", name))
  }

  pub fn open(&self) -> &str {
    &self.open
  }

  pub fn close(&self) -> &str {
    &self.close
  }

  /// Wrap `parts`, in order, between the open and close markers.
  pub fn wrap<'a>(&self, parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::from(self.open.as_str());
    out.extend(parts);
    out.push_str(&self.close);
    out
  }
}

impl Default for Container {
  fn default() -> Self {
    Self::tag(Self::DEFAULT_TAG)
  }
}
