//! A forgiving HTML tree builder on top of `quick-xml`'s pull reader.
//!
//! The source's pages are not well-formed: end tags go missing, void elements
//! are left open and attribute values are unquoted. The builder keeps an open
//! element stack, closes elements implicitly when an ancestor's end tag
//! arrives or a sibling list item or table cell opens, and ignores end tags
//! that match nothing open.

use quick_xml::{
  Reader,
  events::{BytesStart, Event},
};

/// Elements that never have content, whether or not they are self-closed.
const VOID: &[&str] = &[
  "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta",
  "param", "source", "wbr",
];

/// Elements whose content is skipped unparsed.
const RAW_TEXT: &[&str] = &["script", "style"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
  Element(Element),
  Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
  /// Lower-cased tag name.
  pub name:     String,
  attrs:        Vec<(String, String)>,
  pub children: Vec<Node>,
}

impl Element {
  fn new(name: impl Into<String>) -> Self {
    Self { name: name.into(), attrs: Vec::new(), children: Vec::new() }
  }

  fn open(start: &BytesStart<'_>) -> Self {
    let name = String::from_utf8_lossy(start.name().as_ref()).to_ascii_lowercase();
    let attrs = start
      .html_attributes()
      .flatten()
      .map(|a| {
        let key = String::from_utf8_lossy(a.key.as_ref()).to_ascii_lowercase();
        let value = decode_entities(&String::from_utf8_lossy(&a.value));
        (key, value)
      })
      .collect();
    Self { name, attrs, children: Vec::new() }
  }

  pub fn attr(&self, name: &str) -> Option<&str> {
    self
      .attrs
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }

  pub fn has_class(&self, class: &str) -> bool {
    self
      .attr("class")
      .is_some_and(|c| c.split_whitespace().any(|c| c == class))
  }

  /// Direct child elements, skipping text.
  pub fn elements(&self) -> impl Iterator<Item = &Element> {
    self.children.iter().filter_map(|n| match n {
      Node::Element(e) => Some(e),
      Node::Text(_) => None,
    })
  }

  /// First direct child element named `name`.
  pub fn child(&self, name: &str) -> Option<&Element> {
    self.elements().find(|e| e.name == name)
  }

  /// Every descendant element in document order, excluding `self`.
  pub fn descendants(&self) -> Vec<&Element> {
    let mut out = Vec::new();
    self.collect_descendants(&mut out);
    out
  }

  fn collect_descendants<'a>(&'a self, out: &mut Vec<&'a Element>) {
    for child in self.elements() {
      out.push(child);
      child.collect_descendants(out);
    }
  }

  pub fn find(&self, pred: impl Fn(&Element) -> bool) -> Option<&Element> {
    self.descendants().into_iter().find(|e| pred(e))
  }

  pub fn find_by_id(&self, id: &str) -> Option<&Element> {
    self.find(|e| e.attr("id") == Some(id))
  }

  pub fn find_by_class(&self, class: &str) -> Option<&Element> {
    self.find(|e| e.has_class(class))
  }

  /// Descendant elements named `name`, in document order.
  pub fn find_all(&self, name: &str) -> Vec<&Element> {
    self.descendants().into_iter().filter(|e| e.name == name).collect()
  }

  /// Concatenated text content with whitespace runs collapsed.
  pub fn inner_text(&self) -> String {
    let mut raw = String::new();
    self.collect_text(&mut raw);
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
  }

  fn collect_text(&self, out: &mut String) {
    for child in &self.children {
      match child {
        Node::Text(t) => out.push_str(t),
        Node::Element(e) => e.collect_text(out),
      }
    }
  }
}

/// Parse `html` into a tree under a synthetic `#document` root.
///
/// Never fails: a reader error ends the parse and the tree built so far is
/// returned.
pub fn parse(html: &str) -> Element {
  let mut reader = Reader::from_str(html);
  let config = reader.config_mut();
  config.check_end_names = false;
  config.allow_unmatched_ends = true;
  config.check_comments = false;

  let mut stack = vec![Element::new("#document")];

  loop {
    match reader.read_event() {
      Ok(Event::Start(e)) => {
        let el = Element::open(&e);
        if VOID.contains(&el.name.as_str()) {
          append(&mut stack, Node::Element(el));
        } else if RAW_TEXT.contains(&el.name.as_str()) {
          if reader.read_to_end(e.name()).is_err() {
            break;
          }
          append(&mut stack, Node::Element(el));
        } else {
          implied_close(&mut stack, &el.name);
          stack.push(el);
        }
      }
      Ok(Event::Empty(e)) => append(&mut stack, Node::Element(Element::open(&e))),
      Ok(Event::End(e)) => {
        let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
        if let Some(depth) = stack.iter().rposition(|el| el.name == name) {
          while stack.len() > depth {
            close(&mut stack);
          }
        }
      }
      Ok(Event::Text(t)) => {
        let text = decode_entities(&String::from_utf8_lossy(&t));
        append(&mut stack, Node::Text(text));
      }
      Ok(Event::CData(c)) => {
        let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
        append(&mut stack, Node::Text(text));
      }
      Ok(Event::Eof) => break,
      Ok(_) => {}
      Err(e) => {
        tracing::debug!(
          error = %e,
          position = reader.buffer_position(),
          "html parse stopped early"
        );
        break;
      }
    }
  }

  while stack.len() > 1 {
    close(&mut stack);
  }
  stack.pop().unwrap_or_default()
}

fn append(stack: &mut [Element], node: Node) {
  if let Some(top) = stack.last_mut() {
    top.children.push(node);
  }
}

/// Opening `li`, `tr`, `td` or `th` ends an open element of the same family
/// within the nearest enclosing list or table.
fn implied_close(stack: &mut Vec<Element>, name: &str) {
  let (family, scope): (&[&str], &[&str]) = match name {
    "li" => (&["li"], &["ul", "ol"]),
    "tr" => (&["tr"], &["table", "tbody", "thead", "tfoot"]),
    "td" | "th" => (&["td", "th"], &["tr", "table"]),
    _ => return,
  };
  let open = stack.iter().rposition(|e| family.contains(&e.name.as_str()));
  let boundary = stack.iter().rposition(|e| scope.contains(&e.name.as_str()));
  let depth = match (open, boundary) {
    (Some(open), Some(boundary)) if open > boundary => open,
    (Some(open), None) => open,
    _ => return,
  };
  while stack.len() > depth {
    close(stack);
  }
}

fn close(stack: &mut Vec<Element>) {
  if let Some(el) = stack.pop() {
    append(stack, Node::Element(el));
  }
}

/// Decode character references. Unknown references are left as written.
pub fn decode_entities(raw: &str) -> String {
  if !raw.contains('&') {
    return raw.to_string();
  }

  let mut out = String::with_capacity(raw.len());
  let mut rest = raw;
  while let Some(i) = rest.find('&') {
    out.push_str(&rest[..i]);
    rest = &rest[i..];

    let decoded = rest
      .find(';')
      .filter(|&end| end <= 10)
      .and_then(|end| entity(&rest[1..end]).map(|c| (c, end)));
    match decoded {
      Some((c, end)) => {
        out.push(c);
        rest = &rest[end + 1..];
      }
      None => {
        out.push('&');
        rest = &rest[1..];
      }
    }
  }
  out.push_str(rest);
  out
}

fn entity(name: &str) -> Option<char> {
  match name {
    "amp" => Some('&'),
    "lt" => Some('<'),
    "gt" => Some('>'),
    "quot" => Some('"'),
    "apos" => Some('\''),
    "nbsp" => Some('\u{a0}'),
    _ => {
      let num = name.strip_prefix('#')?;
      let code = match num.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => num.parse().ok()?,
      };
      char::from_u32(code)
    }
  }
}
