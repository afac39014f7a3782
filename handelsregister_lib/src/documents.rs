//! Document tree of a search result row and the shareholder lists filed in it.

use std::sync::OnceLock;

use chrono::NaiveDate;
use handelsregister_api::types::DocumentType;
use handelsregister_api::{Client, DocumentQuery, RateLimitedSession};
use regex::Regex;

use crate::entity::EntityRecord;
use crate::error::RegistryError;
use crate::markup::{normalize_whitespace, Extractor, MarkupHandler, StartTag};

/// Label of the folder holding shareholder lists.
pub const SHAREHOLDER_LISTS_FOLDER: &str = "Liste der Gesellschafter";

const ROOT_ID: &str = "tree-root";
const NODE_CLASS: &str = "tree-node";
const FILE_CLASS: &str = "tree-file";
const OPEN_CLASSES: [&str; 2] = ["tree-open", "tree-closed"];
const ERROR_BANNER: &str = "Fehler";

/// Handle of a node within its [`DocumentTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentNode {
    label: String,
    parent: Option<NodeId>,
    /// `None` for files, the (possibly empty) folder contents otherwise.
    children: Option<Vec<NodeId>>,
}

impl DocumentNode {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> Option<&[NodeId]> {
        self.children.as_deref()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

/// Folder/file hierarchy stored as a flat arena; the root is always a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTree {
    nodes: Vec<DocumentNode>,
}

impl DocumentTree {
    pub fn new(root_label: &str) -> Self {
        Self {
            nodes: vec![DocumentNode {
                label: root_label.to_string(),
                parent: None,
                children: Some(Vec::new()),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &DocumentNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Appends a folder or file below `parent`.
    ///
    /// Returns `None` if `parent` is a file.
    pub fn add_child(&mut self, parent: NodeId, label: &str, folder: bool) -> Option<NodeId> {
        let id = NodeId(self.nodes.len());
        self.nodes.get_mut(parent.0)?.children.as_mut()?.push(id);
        self.nodes.push(DocumentNode {
            label: label.to_string(),
            parent: Some(parent),
            children: folder.then(Vec::new),
        });
        Some(id)
    }

    fn label_mut(&mut self, id: NodeId) -> &mut String {
        &mut self.nodes[id.0].label
    }

    /// Nodes below `id` in depth-first document order, `id` excluded.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .node(id)
            .children()
            .map(|c| c.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(children) = self.node(next).children() {
                stack.extend(children.iter().rev().copied());
            }
        }
        out
    }

    /// Filing dates of every shareholder list in the tree.
    ///
    /// A list is a file below a marker folder whose label itself starts with
    /// the marker; other attachments in those folders are skipped.
    pub fn shareholder_lists<'a>(&self, entity: &'a EntityRecord) -> ShareholderFilingDates<'a> {
        let mut dates = Vec::new();
        self.collect_shareholder_dates(self.root(), false, &mut dates);
        ShareholderFilingDates { entity, dates }
    }

    fn collect_shareholder_dates(
        &self,
        id: NodeId,
        in_lists: bool,
        dates: &mut Vec<Option<NaiveDate>>,
    ) {
        let Some(children) = self.node(id).children() else {
            return;
        };
        for &child in children {
            let node = self.node(child);
            if node.is_leaf() {
                if in_lists && node.label().starts_with(SHAREHOLDER_LISTS_FOLDER) {
                    dates.push(parse_list_date(node.label()));
                }
            } else {
                let marker = node.label() == SHAREHOLDER_LISTS_FOLDER;
                self.collect_shareholder_dates(child, in_lists || marker, dates);
            }
        }
    }
}

/// Shareholder list filing dates of one entity, in document order.
///
/// A list whose label carries no date is kept as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ShareholderFilingDates<'a> {
    pub entity: &'a EntityRecord,
    pub dates: Vec<Option<NaiveDate>>,
}

fn list_date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\d{1,2})\.(\d{1,2})\.(\d{4}|\d{2})\b").expect("list date pattern is valid")
    })
}

/// First `D.M.YY` or `D.M.YYYY` date in a document label.
fn parse_list_date(label: &str) -> Option<NaiveDate> {
    let caps = list_date_pattern().captures(label)?;
    let mut year: i32 = caps[3].parse().ok()?;
    if caps[3].len() == 2 {
        year += if year < 70 { 2000 } else { 1900 };
    }
    NaiveDate::from_ymd_opt(year, caps[2].parse().ok()?, caps[1].parse().ok()?)
}

/// Fetches and parses the document tree of result row `index`.
pub async fn fetch_documents(
    client: &Client,
    session: &RateLimitedSession,
    index: u32,
) -> Result<DocumentTree, RegistryError> {
    let query = DocumentQuery::new(DocumentType::Documents, index);
    let html = client.get_document(session, &query).await?;
    DocumentTreeExtractor::default()
        .extract(&html)
        .ok_or(RegistryError::MalformedPage("document tree"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum TreeState {
    #[default]
    Void,
    Building,
    Finished,
    Error,
}

/// What an open `<div>` stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DivRole {
    Root,
    Folder,
    Contents,
    File,
    Other,
}

#[derive(Debug, Default)]
pub struct DocumentTreeExtractor {
    state: TreeState,
    in_heading: bool,
    divs: Vec<DivRole>,
    current: Option<NodeId>,
    tree: Option<DocumentTree>,
}

impl DocumentTreeExtractor {
    /// Innermost open div that is part of the tree structure.
    fn structural_role(&self) -> Option<DivRole> {
        self.divs.iter().rev().copied().find(|r| *r != DivRole::Other)
    }

    fn open_div(&mut self, tag: &StartTag) {
        let is_open = OPEN_CLASSES.iter().any(|c| tag.has_class(c));
        let is_node = tag.has_class(NODE_CLASS);
        let is_file = tag.has_class(FILE_CLASS);

        if self.state == TreeState::Void {
            if tag.attr("id") == Some(ROOT_ID) {
                let tree = DocumentTree::new("");
                self.current = Some(tree.root());
                self.tree = Some(tree);
                self.divs.push(DivRole::Root);
                self.state = TreeState::Building;
            } else if is_open || is_node || is_file {
                tracing::warn!("Document tree content before its root");
                self.state = TreeState::Error;
            }
            return;
        }

        let role = match self.structural_role() {
            Some(DivRole::Root | DivRole::Folder) if is_open => DivRole::Contents,
            Some(DivRole::Contents) if is_node || is_file => {
                let (Some(tree), Some(parent)) = (self.tree.as_mut(), self.current) else {
                    return;
                };
                match tree.add_child(parent, "", is_node) {
                    Some(child) => {
                        self.current = Some(child);
                        if is_node {
                            DivRole::Folder
                        } else {
                            DivRole::File
                        }
                    }
                    None => DivRole::Other,
                }
            }
            _ => DivRole::Other,
        };
        self.divs.push(role);
    }

    fn close_div(&mut self) {
        let Some(role) = self.divs.pop() else {
            return;
        };
        if !matches!(role, DivRole::Root | DivRole::Folder | DivRole::File) {
            return;
        }
        let (Some(tree), Some(id)) = (self.tree.as_mut(), self.current) else {
            return;
        };
        let label = tree.label_mut(id);
        let normalized = normalize_whitespace(label);
        *label = normalized;
        match tree.node(id).parent() {
            Some(parent) if role != DivRole::Root => self.current = Some(parent),
            _ => self.state = TreeState::Finished,
        }
    }
}

impl MarkupHandler for DocumentTreeExtractor {
    fn start_tag(&mut self, tag: &StartTag) {
        match (tag.name(), self.state) {
            (_, TreeState::Finished | TreeState::Error) => {}
            ("div", _) => self.open_div(tag),
            ("h1" | "h2" | "h3" | "h4", _) => self.in_heading = true,
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        match self.state {
            TreeState::Void if self.in_heading && text.contains(ERROR_BANNER) => {
                tracing::warn!("Document page reports an error: {}", text.trim());
                self.state = TreeState::Error;
            }
            TreeState::Building => {
                if !matches!(
                    self.structural_role(),
                    Some(DivRole::Root | DivRole::Folder | DivRole::File)
                ) {
                    return;
                }
                if let (Some(tree), Some(id)) = (self.tree.as_mut(), self.current) {
                    tree.label_mut(id).push_str(text);
                }
            }
            _ => {}
        }
    }

    fn end_tag(&mut self, name: &str) {
        match (name, self.state) {
            ("div", TreeState::Building) => self.close_div(),
            ("h1" | "h2" | "h3" | "h4", _) => self.in_heading = false,
            _ => {}
        }
    }
}

impl Extractor for DocumentTreeExtractor {
    type Output = DocumentTree;

    fn finish(self) -> Option<DocumentTree> {
        match self.state {
            TreeState::Finished => self.tree,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"
<html><body>
<h3>Dokumente</h3>
<div id="tree-root">Muster GmbH
  <div class="tree-open">
    <div class="tree-node">Dokumente zum Rechtsträger
      <div class="tree-open">
        <div class="tree-node">Liste der Gesellschafter
          <div class="tree-closed">
            <div class="tree-file"><a href="#">Liste der Gesellschafter vom 14.02.2013</a></div>
            <div class="tree-file"><a href="#">Liste der Gesellschafter</a>
              <div class="hint">ohne Datum</div></div>
            <div class="tree-file"><a href="#">Liste der Gesellschafter - 1.7.09</a></div>
          </div>
        </div>
        <div class="tree-node">Gesellschaftsvertrag
          <div class="tree-closed">
            <div class="tree-file">Gesellschaftsvertrag vom 01.01.2010</div>
          </div>
        </div>
        <div class="tree-node">Leer<div class="tree-closed"></div></div>
      </div>
    </div>
  </div>
</div>
<div class="tree-file">outside</div>
</body></html>"##;

    fn parse(html: &str) -> Option<DocumentTree> {
        DocumentTreeExtractor::default().extract(html)
    }

    fn labels(tree: &DocumentTree, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|id| tree.node(*id).label().to_string()).collect()
    }

    #[test]
    fn builds_folder_hierarchy() {
        let tree = parse(PAGE).unwrap();
        let root = tree.node(tree.root());
        assert_eq!(root.label(), "Muster GmbH");
        assert_eq!(labels(&tree, root.children().unwrap()), vec!["Dokumente zum Rechtsträger"]);

        let folder = root.children().unwrap()[0];
        assert_eq!(
            labels(&tree, tree.node(folder).children().unwrap()),
            vec!["Liste der Gesellschafter", "Gesellschaftsvertrag", "Leer"]
        );
    }

    #[test]
    fn files_are_leaves_and_empty_folders_are_not() {
        let tree = parse(PAGE).unwrap();
        let all = tree.descendants(tree.root());
        assert_eq!(all.len(), tree.len() - 1);

        let leaves: Vec<NodeId> = all.iter().copied().filter(|id| tree.node(*id).is_leaf()).collect();
        assert_eq!(
            labels(&tree, &leaves),
            vec![
                "Liste der Gesellschafter vom 14.02.2013",
                "Liste der Gesellschafter ohne Datum",
                "Liste der Gesellschafter - 1.7.09",
                "Gesellschaftsvertrag vom 01.01.2010",
            ]
        );
        let empty = all.iter().find(|id| tree.node(**id).label() == "Leer").unwrap();
        assert_eq!(tree.node(*empty).children(), Some(&[][..]));
    }

    #[test]
    fn parents_point_back_up() {
        let tree = parse(PAGE).unwrap();
        for id in tree.descendants(tree.root()) {
            let parent = tree.node(id).parent().unwrap();
            assert!(tree.node(parent).children().unwrap().contains(&id));
        }
        assert_eq!(tree.node(tree.root()).parent(), None);
    }

    #[test]
    fn shareholder_dates_in_document_order() {
        let tree = parse(PAGE).unwrap();
        let entity = EntityRecord::default();
        let lists = tree.shareholder_lists(&entity);
        assert_eq!(
            lists.dates,
            vec![
                NaiveDate::from_ymd_opt(2013, 2, 14),
                None,
                NaiveDate::from_ymd_opt(2009, 7, 1),
            ]
        );
    }

    #[test]
    fn two_shareholder_lists_yield_two_dates() {
        let html = r#"<div id="tree-root">root<div class="tree-open">
            <div class="tree-node">Liste der Gesellschafter<div class="tree-open">
              <div class="tree-file">Liste der Gesellschafter 02.03.2015</div>
              <div class="tree-file">Liste der Gesellschafter 24.12.2019</div>
            </div></div></div></div>"#;
        let tree = parse(html).unwrap();
        let entity = EntityRecord::default();
        assert_eq!(
            tree.shareholder_lists(&entity).dates,
            vec![NaiveDate::from_ymd_opt(2015, 3, 2), NaiveDate::from_ymd_opt(2019, 12, 24)]
        );
    }

    #[test]
    fn other_attachments_in_list_folder_are_skipped() {
        let html = r#"<div id="tree-root">root<div class="tree-open">
            <div class="tree-node">Liste der Gesellschafter<div class="tree-open">
              <div class="tree-file">Liste der Gesellschafter 02.03.2015</div>
              <div class="tree-file">Begleitschreiben 02.03.2015</div>
              <div class="tree-file">Liste der Gesellschafter</div>
            </div></div></div></div>"#;
        let tree = parse(html).unwrap();
        let entity = EntityRecord::default();
        assert_eq!(
            tree.shareholder_lists(&entity).dates,
            vec![NaiveDate::from_ymd_opt(2015, 3, 2), None]
        );
    }

    #[test]
    fn tree_without_shareholder_folder_has_no_dates() {
        let html = PAGE.replace("<div class=\"tree-node\">Liste der Gesellschafter", "<div class=\"tree-node\">Sonstiges");
        let tree = parse(&html).unwrap();
        let entity = EntityRecord::default();
        assert!(tree.shareholder_lists(&entity).dates.is_empty());
    }

    #[test]
    fn two_digit_years_pivot_at_seventy() {
        assert_eq!(parse_list_date("vom 1.2.69"), NaiveDate::from_ymd_opt(2069, 2, 1));
        assert_eq!(parse_list_date("vom 1.2.70"), NaiveDate::from_ymd_opt(1970, 2, 1));
        assert_eq!(parse_list_date("ohne"), None);
        assert_eq!(parse_list_date("30.02.2001"), None);
    }

    #[test]
    fn error_banner_before_root_yields_nothing() {
        let html = format!("<h3>Fehler</h3>{}", PAGE);
        assert!(parse(&html).is_none());
    }

    #[test]
    fn tree_content_before_root_yields_nothing() {
        let html = format!("<div class=\"tree-file\">stray</div>{}", PAGE);
        assert!(parse(&html).is_none());
    }

    #[test]
    fn unterminated_tree_yields_nothing() {
        let html = r#"<div id="tree-root">root<div class="tree-open"><div class="tree-file">a</div>"#;
        assert!(parse(html).is_none());
    }

    #[test]
    fn files_cannot_have_children() {
        let mut tree = DocumentTree::new("root");
        let file = tree.add_child(tree.root(), "a.pdf", false).unwrap();
        assert!(tree.add_child(file, "b.pdf", false).is_none());
        assert_eq!(tree.len(), 2);
    }
}
