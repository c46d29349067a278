//! The expression tree: one horizontal line of math, its nested scopes,
//! and the LaTeX it spells.
//!
//! A [`Node`] is one level of the expression; each of its [`Block`]s
//! carries a recognized grapheme and typed child scopes (exponent and
//! indice for a regular character, numerator and denominator for a
//! fraction). New strokes are placed by descending the tree with an
//! approximate rectangle containment, then inserted among their
//! siblings by x-midpoint.

use kurbo::{Point, Rect};
use log::debug;

use crate::config::{EM_BASELINE_RATIO, EM_HEIGHT, EM_WIDTH};
use crate::footprint::Footprint;
use crate::geom::{self, HeightGrid};
use crate::record::{self, Identification, Record};
use crate::store::Store;

/// Share of a glyph's area that must fall inside a candidate box for
/// the glyph to be considered inside it.
const CONTAINMENT_RATIO: f64 = 0.6;

/// Exponent/indice scope height, as a share of the EM square.
const SCRIPT_HEIGHT_RATIO: f64 = 0.5;

/// The exponent baseline sits this share of an EM above the glyph top.
const EXPONENT_RAISE_RATIO: f64 = 0.1;

/// The indice baseline sits this share of an EM below the glyph bottom.
const INDICE_DROP_RATIO: f64 = 0.3;

/// Script scopes start this share of the glyph width before its right
/// edge, so small exponents drawn close to the glyph still land inside.
const SCRIPT_X_OVERLAP: f64 = 0.2;

/// Fraction scope height, as a share of the EM square.
const FRAC_HEIGHT_RATIO: f64 = 0.9;

/// One recognized symbol placed in the tree.
#[derive(Debug, Clone)]
pub struct Grapheme {
    pub r: char,
    pub symbol: Footprint,
}

/// One level of the expression. An empty node is a blank area where
/// symbols may still be written.
#[derive(Debug, Clone)]
pub struct Node {
    pub grid: HeightGrid,
    /// Left edge of the blank area when the node is empty.
    initial_x: f64,
    /// Width of the blank area.
    width: f64,
    blocks: Vec<Block>,
}

impl Node {
    fn new(grid: HeightGrid, initial_x: f64, width: f64) -> Node {
        Node {
            grid,
            initial_x,
            width,
            blocks: Vec::new(),
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Box of the written content only; empty for a blank node.
    pub fn inner_box(&self) -> Rect {
        self.blocks
            .iter()
            .fold(geom::EMPTY_RECT, |acc, b| geom::union(acc, b.inner_box()))
    }

    /// Box of the area the node covers: the blank area plus the content
    /// and one EM of trailing room.
    pub fn outer_box(&self) -> Rect {
        let inner = self.inner_box();
        let x1 = if geom::is_empty(inner) {
            self.initial_x + self.width
        } else {
            (inner.x1 + EM_WIDTH).max(self.initial_x + self.width)
        };
        Rect {
            x0: self.initial_x,
            y0: self.grid.y_min,
            x1,
            y1: self.grid.y_max,
        }
    }

    fn insert_at(&mut self, index: usize, block: Block) {
        self.blocks.insert(index.min(self.blocks.len()), block);
    }

    pub fn latex(&self) -> String {
        self.blocks.iter().map(Block::latex).collect()
    }
}

// ── Blocks ───────────────────────────────────────────────

/// A component of an expression: a grapheme plus its typed child scopes.
#[derive(Debug, Clone)]
pub enum Block {
    RegularChar(CharBlock),
    FracOperator(FracBlock),
    /// Sketched large operators: recognized but without child scopes
    /// yet, rendering nothing.
    SumOperator(Grapheme),
    ProdOperator(Grapheme),
    IntegralOperator(Grapheme),
}

/// A plain character with its indice and exponent scopes.
#[derive(Debug, Clone)]
pub struct CharBlock {
    pub grapheme: Grapheme,
    pub indice: Node,
    pub exponent: Node,
}

/// A fraction bar with its stacked scopes.
#[derive(Debug, Clone)]
pub struct FracBlock {
    pub grapheme: Grapheme,
    pub num: Node,
    pub den: Node,
}

impl CharBlock {
    fn new(grapheme: Grapheme) -> CharBlock {
        let bb = grapheme.symbol.bounding_box();
        let x_left = bb.x1 - SCRIPT_X_OVERLAP * geom::width(bb);
        let height = SCRIPT_HEIGHT_RATIO * EM_HEIGHT;

        let exponent = Node::new(
            HeightGrid::from_baseline(bb.y0 - EXPONENT_RAISE_RATIO * EM_HEIGHT, height),
            x_left,
            EM_WIDTH,
        );
        let indice = Node::new(
            HeightGrid::from_baseline(bb.y1 + INDICE_DROP_RATIO * EM_HEIGHT, height),
            x_left,
            EM_WIDTH,
        );

        CharBlock {
            grapheme,
            indice,
            exponent,
        }
    }
}

impl FracBlock {
    fn new(grapheme: Grapheme) -> FracBlock {
        let bb = grapheme.symbol.bounding_box();
        let bar_y = (bb.y0 + bb.y1) / 2.0;
        let height = FRAC_HEIGHT_RATIO * EM_HEIGHT;

        let num = Node::new(
            HeightGrid {
                y_min: bar_y - height,
                y_max: bar_y,
                baseline: bar_y - height + height * EM_BASELINE_RATIO,
            },
            bb.x0,
            geom::width(bb),
        );
        let den = Node::new(
            HeightGrid {
                y_min: bar_y,
                y_max: bar_y + height,
                baseline: bar_y + height * EM_BASELINE_RATIO,
            },
            bb.x0,
            geom::width(bb),
        );

        FracBlock {
            grapheme,
            num,
            den,
        }
    }
}

impl Block {
    /// Build the block variant a rune calls for.
    fn for_rune(grapheme: Grapheme) -> Block {
        match grapheme.r {
            '_' => Block::FracOperator(FracBlock::new(grapheme)),
            '∑' => Block::SumOperator(grapheme),
            '∏' => Block::ProdOperator(grapheme),
            '∫' => Block::IntegralOperator(grapheme),
            _ => Block::RegularChar(CharBlock::new(grapheme)),
        }
    }

    pub fn grapheme(&self) -> &Grapheme {
        match self {
            Block::RegularChar(b) => &b.grapheme,
            Block::FracOperator(b) => &b.grapheme,
            Block::SumOperator(g) | Block::ProdOperator(g) | Block::IntegralOperator(g) => g,
        }
    }

    pub fn children(&self) -> Vec<&Node> {
        match self {
            Block::RegularChar(b) => vec![&b.indice, &b.exponent],
            Block::FracOperator(b) => vec![&b.num, &b.den],
            _ => Vec::new(),
        }
    }

    fn children_mut(&mut self) -> Vec<&mut Node> {
        match self {
            Block::RegularChar(b) => vec![&mut b.indice, &mut b.exponent],
            Block::FracOperator(b) => vec![&mut b.num, &mut b.den],
            _ => Vec::new(),
        }
    }

    /// Glyph plus written children content.
    pub fn inner_box(&self) -> Rect {
        self.children()
            .iter()
            .fold(self.grapheme().symbol.bounding_box(), |acc, n| {
                geom::union(acc, n.inner_box())
            })
    }

    /// Glyph plus the full child scope areas, written or blank.
    pub fn outer_box(&self) -> Rect {
        self.children()
            .iter()
            .fold(self.grapheme().symbol.bounding_box(), |acc, n| {
                geom::union(acc, n.outer_box())
            })
    }

    pub fn latex(&self) -> String {
        match self {
            Block::RegularChar(b) => {
                let mut out = b.grapheme.r.to_string();
                let indice = b.indice.latex();
                let exponent = b.exponent.latex();
                if !indice.is_empty() {
                    out.push_str(&format!("_{{{indice}}}"));
                }
                if !exponent.is_empty() {
                    out.push_str(&format!("^{{{exponent}}}"));
                }
                out
            }
            Block::FracOperator(b) => {
                format!("\\frac{{{}}}{{{}}}", b.num.latex(), b.den.latex())
            }
            Block::SumOperator(_) | Block::ProdOperator(_) | Block::IntegralOperator(_) => {
                String::new()
            }
        }
    }
}

// ── Cursor ───────────────────────────────────────────────

/// Handle to the slot of the last inserted block: the descent path
/// (block index, child index) from the root plus the block index in the
/// final node. Indices, not pointers, so any structural edit simply
/// fails validation instead of dangling.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Cursor {
    path: Vec<(usize, usize)>,
    index: usize,
}

// ── Line ─────────────────────────────────────────────────

/// One line of handwritten math.
#[derive(Debug)]
pub struct Line {
    root: Node,
    cursor: Option<Cursor>,
}

impl Line {
    /// An empty line covering the given vertical band.
    pub fn new(grid: HeightGrid) -> Line {
        Line {
            root: Node::new(grid, 0.0, EM_WIDTH),
            cursor: None,
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn clear(&mut self) {
        self.root.blocks.clear();
        self.cursor = None;
    }

    /// The LaTeX spelled by the current tree.
    pub fn to_latex(&self) -> String {
        self.root.latex()
    }

    /// Identify the record and place the result in the tree.
    ///
    /// Returns the identification so the caller can triage the recorder;
    /// `None` when the record is empty.
    pub fn insert(&mut self, record: &Record, store: &Store) -> Option<Identification> {
        let glyph = record.last_shape()?.bounding_box();

        let path = self.descend(glyph);
        let node = self.node_at(&path);
        let context = node.grid;
        let index = insertion_index(glyph, &node.blocks);

        let ident = record::identify(record, store, context);
        debug!(
            "insert: {:?} at depth {} index {index} (compound: {})",
            ident.r,
            path.len(),
            ident.compound
        );

        if ident.r == '\0' {
            // nothing recognizable: leave the tree untouched
            return Some(ident);
        }

        let block = Block::for_rune(Grapheme {
            r: ident.r,
            symbol: ident.footprint.clone(),
        });

        if ident.compound {
            if let Some(cursor) = self.cursor.clone() {
                if let Some(slot) = self.block_at_mut(&cursor) {
                    *slot = block;
                    return Some(ident);
                }
            }
        }

        let node = self.node_at_mut(&path);
        node.insert_at(index, block);
        self.cursor = Some(Cursor { path, index });
        Some(ident)
    }

    /// The node enclosing `p`, as the area it covers and its grid; used
    /// to preview where a stroke would land.
    pub fn find_context(&self, p: Point) -> (Rect, HeightGrid) {
        let path = self.descend(Rect::new(p.x, p.y, p.x, p.y));
        let node = self.node_at(&path);
        (node.outer_box(), node.grid)
    }

    /// Every footprint placed in the tree, in depth-first order.
    pub fn symbols(&self) -> Vec<&Footprint> {
        let mut out = Vec::new();
        collect_symbols(&self.root, &mut out);
        out
    }

    /// Every scope area of the tree, for the editor overlay.
    pub fn scopes(&self) -> Vec<Rect> {
        let mut out = Vec::new();
        collect_scopes(&self.root, &mut out);
        out
    }

    // ── Tree walking ─────────────────────────────────────

    /// Walk down as long as the glyph is contained in a block and then
    /// in one of that block's scopes.
    fn descend(&self, glyph: Rect) -> Vec<(usize, usize)> {
        let mut path = Vec::new();
        let mut node = &self.root;
        loop {
            let boxes: Vec<Rect> = node.blocks.iter().map(Block::outer_box).collect();
            let Some(block_index) = index_in_areas(glyph, &boxes) else {
                break;
            };
            let block = &node.blocks[block_index];
            let scopes: Vec<Rect> = block.children().iter().map(|n| n.outer_box()).collect();
            let Some(child_index) = index_in_areas(glyph, &scopes) else {
                // inside the block but in none of its scopes: this level
                break;
            };
            path.push((block_index, child_index));
            node = block.children()[child_index];
        }
        path
    }

    fn node_at(&self, path: &[(usize, usize)]) -> &Node {
        let mut node = &self.root;
        for &(block, child) in path {
            node = node.blocks[block].children()[child];
        }
        node
    }

    fn node_at_mut(&mut self, path: &[(usize, usize)]) -> &mut Node {
        let mut node = &mut self.root;
        for &(block, child) in path {
            node = node.blocks[block].children_mut().swap_remove(child);
        }
        node
    }

    /// Resolve a cursor, failing when a structural edit outdated it.
    fn block_at_mut(&mut self, cursor: &Cursor) -> Option<&mut Block> {
        let mut node = &mut self.root;
        for &(block, child) in &cursor.path {
            if block >= node.blocks.len() {
                return None;
            }
            let mut children = node.blocks[block].children_mut();
            if child >= children.len() {
                return None;
            }
            node = children.swap_remove(child);
        }
        node.blocks.get_mut(cursor.index)
    }
}

fn collect_symbols<'a>(node: &'a Node, out: &mut Vec<&'a Footprint>) {
    for block in &node.blocks {
        out.push(&block.grapheme().symbol);
        for child in block.children() {
            collect_symbols(child, out);
        }
    }
}

fn collect_scopes(node: &Node, out: &mut Vec<Rect>) {
    for block in &node.blocks {
        for child in block.children() {
            out.push(child.outer_box());
            collect_scopes(child, out);
        }
    }
}

/// Approximate rect-in-rect containment: the first candidate holding at
/// least [`CONTAINMENT_RATIO`] of the glyph area, or containing the
/// glyph center when the glyph has no area (a point).
fn index_in_areas(glyph: Rect, candidates: &[Rect]) -> Option<usize> {
    let glyph_area = geom::area(glyph);
    let center = Point::new(geom::mid_x(glyph), (glyph.y0 + glyph.y1) / 2.0);
    for (index, &candidate) in candidates.iter().enumerate() {
        if glyph_area <= 0.0 {
            if geom::contains(candidate, center) {
                return Some(index);
            }
            continue;
        }
        let common = geom::area(geom::intersection(candidate, glyph));
        if common / glyph_area >= CONTAINMENT_RATIO {
            return Some(index);
        }
    }
    None
}

/// Where to insert `glyph` among blocks kept sorted by x-midpoint of
/// their inner boxes.
fn insertion_index(glyph: Rect, blocks: &[Block]) -> usize {
    let middle = geom::mid_x(glyph);
    for (index, block) in blocks.iter().enumerate() {
        if middle > geom::mid_x(block.inner_box()) {
            continue;
        }
        return index;
    }
    blocks.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bezier::segment_bez;
    use crate::footprint::Stroke;
    use kurbo::Point;

    fn grid() -> HeightGrid {
        HeightGrid {
            y_min: 0.0,
            y_max: 60.0,
            baseline: 42.0,
        }
    }

    fn glyph_at(r: char, x0: f64, y0: f64, x1: f64, y1: f64) -> Grapheme {
        Grapheme {
            r,
            symbol: Footprint {
                strokes: vec![Stroke::from_curves(vec![segment_bez(
                    Point::new(x0, y0),
                    Point::new(x1, y1),
                )])],
            },
        }
    }

    fn char_block(r: char, x0: f64, y0: f64, x1: f64, y1: f64) -> Block {
        Block::for_rune(glyph_at(r, x0, y0, x1, y1))
    }

    #[test]
    fn flat_line_prints_the_runes_in_order() {
        let mut line = Line::new(grid());
        line.root.insert_at(0, char_block('a', 0.0, 20.0, 15.0, 42.0));
        line.root.insert_at(1, char_block('b', 20.0, 10.0, 35.0, 42.0));
        line.root.insert_at(2, char_block('c', 40.0, 20.0, 55.0, 42.0));
        assert_eq!(line.to_latex(), "abc");
    }

    #[test]
    fn insertion_index_follows_x_midpoints() {
        let blocks = vec![
            char_block('a', 0.0, 20.0, 15.0, 42.0),
            char_block('c', 40.0, 20.0, 55.0, 42.0),
        ];
        // a glyph between the two goes in the middle
        assert_eq!(
            insertion_index(Rect::new(20.0, 10.0, 35.0, 42.0), &blocks),
            1
        );
        assert_eq!(insertion_index(Rect::new(-20.0, 10.0, -5.0, 42.0), &blocks), 0);
        assert_eq!(insertion_index(Rect::new(60.0, 10.0, 80.0, 42.0), &blocks), 2);
    }

    #[test]
    fn exponent_scope_sits_above_the_glyph_top() {
        let block = char_block('x', 0.0, 20.0, 15.0, 42.0);
        let children = block.children();
        let (indice, exponent) = (children[0], children[1]);

        assert!(exponent.grid.baseline < 20.0);
        assert!(indice.grid.baseline > 42.0);
        // both scopes start before the glyph right edge
        assert!(exponent.outer_box().x0 < 15.0);
        assert_eq!(exponent.outer_box().x0, indice.outer_box().x0);
    }

    #[test]
    fn descent_enters_the_exponent_scope() {
        let mut line = Line::new(grid());
        line.root.insert_at(0, char_block('x', 0.0, 20.0, 15.0, 42.0));

        let block = &line.root.blocks()[0];
        let scope = block.children()[1].outer_box();
        // a small glyph drawn inside the exponent area
        let small = Rect::new(scope.x0 + 2.0, scope.y0 + 2.0, scope.x0 + 8.0, scope.y1 - 2.0);
        let path = line.descend(small);
        assert_eq!(path, vec![(0, 1)]);

        // a glyph clearly to the right of everything stays at the root
        let far = Rect::new(200.0, 20.0, 215.0, 42.0);
        assert!(line.descend(far).is_empty());
    }

    #[test]
    fn fraction_prints_num_and_den() {
        let mut line = Line::new(grid());
        let mut frac = match Block::for_rune(glyph_at('_', 10.0, 30.0, 40.0, 30.0)) {
            Block::FracOperator(f) => f,
            _ => unreachable!("an underscore builds a fraction"),
        };
        frac.num.insert_at(0, char_block('1', 20.0, 10.0, 28.0, 28.0));
        frac.den.insert_at(0, char_block('2', 20.0, 32.0, 28.0, 50.0));
        line.root.insert_at(0, Block::FracOperator(frac));
        assert_eq!(line.to_latex(), "\\frac{1}{2}");
    }

    #[test]
    fn stub_operators_render_nothing() {
        let sum = Block::for_rune(glyph_at('∑', 0.0, 10.0, 20.0, 40.0));
        assert_eq!(sum.latex(), "");
        assert!(sum.children().is_empty());
    }

    #[test]
    fn symbols_and_scopes_walk_the_whole_tree() {
        let mut line = Line::new(grid());
        line.root.insert_at(0, char_block('x', 0.0, 20.0, 15.0, 42.0));
        match &mut line.root.blocks[0] {
            Block::RegularChar(b) => {
                b.exponent.insert_at(0, char_block('2', 18.0, 4.0, 26.0, 14.0))
            }
            _ => unreachable!(),
        }

        // x and its exponent 2
        assert_eq!(line.symbols().len(), 2);
        // two scopes per regular character
        assert_eq!(line.scopes().len(), 4);
        assert_eq!(line.to_latex(), "x^{2}");
    }

    #[test]
    fn find_context_reports_the_enclosing_scope() {
        let mut line = Line::new(grid());
        line.root.insert_at(0, char_block('x', 0.0, 20.0, 15.0, 42.0));
        let exponent_box = line.root.blocks()[0].children()[1].outer_box();

        let inside = Point::new(exponent_box.x0 + 1.0, (exponent_box.y0 + exponent_box.y1) / 2.0);
        let (_, ctx) = line.find_context(inside);
        assert!((ctx.y_min - exponent_box.y0).abs() < 1e-9);

        let outside = Point::new(300.0, 30.0);
        let (_, root_ctx) = line.find_context(outside);
        assert_eq!(root_ctx, grid());
    }
}
