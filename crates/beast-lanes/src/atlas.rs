// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Guillotine rectangle packing for texture and shadow atlases.
//!
//! [`TextureAtlasLayout`] places rectangles one at a time into a single page
//! using a binary tree of free regions. Each insertion descends to a leaf
//! that can hold the rectangle and splits it in two along the axis that
//! leaves the more balanced remainder. The layout keeps a running size that
//! starts at the initial size and grows, up to the page maximum, only when a
//! rectangle cannot be placed inside the current bounds.
//!
//! [`create_atlas_layout`] packs a whole batch over as many pages as needed.

use beast_core::math::{Rect2, Rect2I};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TexAtlasNode {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    children: Option<[usize; 2]>,
    full: bool,
}

impl TexAtlasNode {
    fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            children: None,
            full: false,
        }
    }
}

/// Packs rectangles into one atlas page.
#[derive(Debug, Clone)]
pub struct TextureAtlasLayout {
    initial_width: u32,
    initial_height: u32,
    width: u32,
    height: u32,
    max_width: u32,
    max_height: u32,
    pow2: bool,
    nodes: Vec<TexAtlasNode>,
}

impl TextureAtlasLayout {
    /// Creates an empty layout.
    ///
    /// The page starts at `initial_width` x `initial_height` and may grow up
    /// to `max_width` x `max_height`. With `pow2` set the reported size is
    /// always rounded up to a power of two.
    pub fn new(initial_width: u32, initial_height: u32, max_width: u32, max_height: u32, pow2: bool) -> Self {
        let initial_width = initial_width.min(max_width);
        let initial_height = initial_height.min(max_height);
        let mut layout = Self {
            initial_width,
            initial_height,
            width: initial_width,
            height: initial_height,
            max_width,
            max_height,
            pow2,
            nodes: Vec::new(),
        };
        layout.clear();
        layout
    }

    /// Places a rectangle and returns its top-left corner, or `None` when it
    /// does not fit even after growing the page to its maximum size.
    ///
    /// Zero-sized rectangles are placed at the origin without using space.
    pub fn add_element(&mut self, width: u32, height: u32) -> Option<(u32, u32)> {
        if width == 0 || height == 0 {
            return Some((0, 0));
        }

        let placed = self
            .add_to_node(0, width, height, false)
            .or_else(|| self.add_to_node(0, width, height, true))?;

        self.width = self.width.max(placed.0 + width);
        self.height = self.height.max(placed.1 + height);
        if self.pow2 {
            self.width = self.width.next_power_of_two();
            self.height = self.height.next_power_of_two();
        }
        Some(placed)
    }

    /// Removes every element and restores the initial size.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.nodes
            .push(TexAtlasNode::new(0, 0, self.max_width, self.max_height));
        self.width = self.initial_width;
        self.height = self.initial_height;
        if self.pow2 {
            self.width = self.width.next_power_of_two();
            self.height = self.height.next_power_of_two();
        }
    }

    /// Whether nothing has been placed since creation or the last `clear`.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1 && !self.nodes[0].full
    }

    /// Current width, covering every placed element.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Current height, covering every placed element.
    pub fn height(&self) -> u32 {
        self.height
    }

    fn add_to_node(&mut self, index: usize, width: u32, height: u32, allow_growth: bool) -> Option<(u32, u32)> {
        let node = self.nodes[index];

        if let Some([first, second]) = node.children {
            return self
                .add_to_node(first, width, height, allow_growth)
                .or_else(|| self.add_to_node(second, width, height, allow_growth));
        }

        if node.full || width > node.width || height > node.height {
            return None;
        }
        if !allow_growth && (node.x + width > self.width || node.y + height > self.height) {
            return None;
        }

        if width == node.width && height == node.height {
            self.nodes[index].full = true;
            return Some((node.x, node.y));
        }

        let aspect = self.width.max(1) as f32 / self.height.max(1) as f32;
        let dw = (node.width - width) as f32;
        let dh = (node.height - height) as f32 * aspect;

        let (first, second) = if dw > dh {
            (
                TexAtlasNode::new(node.x, node.y, width, node.height),
                TexAtlasNode::new(node.x + width, node.y, node.width - width, node.height),
            )
        } else {
            (
                TexAtlasNode::new(node.x, node.y, node.width, height),
                TexAtlasNode::new(node.x, node.y + height, node.width, node.height - height),
            )
        };

        let first_index = self.nodes.len();
        self.nodes.push(first);
        self.nodes.push(second);
        self.nodes[index].children = Some([first_index, first_index + 1]);

        self.add_to_node(first_index, width, height, allow_growth)
    }
}

/// One rectangle of a batch packed by [`create_atlas_layout`].
///
/// `width` and `height` are inputs; `x`, `y` and `page` are written by
/// the packer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AtlasElement {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
    pub page: u32,
}

impl AtlasElement {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Placed region in texels.
    pub fn region(&self) -> Rect2I {
        Rect2I::new(self.x as i32, self.y as i32, self.width, self.height)
    }

    /// Placed region in normalized texture coordinates of its page.
    pub fn uv_rect(&self, page: &AtlasPage) -> Rect2 {
        self.region().normalized(page.width, page.height)
    }
}

/// Final size of one page produced by [`create_atlas_layout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasPage {
    pub width: u32,
    pub height: u32,
}

/// Packs a batch of rectangles into as few pages as the greedy fill allows.
///
/// Elements are visited largest area first. Each page is filled by
/// repeatedly taking the largest unplaced element below a size limit; an
/// element that fails to fit lowers the limit to its own area, so the page
/// fills from large to small without retrying rejected sizes. When nothing
/// more fits, a new page starts.
///
/// If any element is larger than a page can ever be, nothing is packed and
/// the returned list is empty.
pub fn create_atlas_layout(
    elements: &mut [AtlasElement],
    width: u32,
    height: u32,
    max_width: u32,
    max_height: u32,
    pow2: bool,
) -> Vec<AtlasPage> {
    if let Some(too_large) = elements
        .iter()
        .find(|e| e.width > max_width || e.height > max_height)
    {
        log::error!(
            "Atlas element of size {}x{} does not fit into a {}x{} page",
            too_large.width,
            too_large.height,
            max_width,
            max_height
        );
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..elements.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(elements[i].width as u64 * elements[i].height as u64));

    let mut placed = vec![false; elements.len()];
    let mut remaining = elements.len();
    let mut pages = Vec::new();

    while remaining > 0 {
        let page_index = pages.len() as u32;
        let mut layout = TextureAtlasLayout::new(width, height, max_width, max_height, pow2);
        let mut size_limit = u64::MAX;

        loop {
            let candidate = order.iter().copied().find(|&i| {
                !placed[i] && (elements[i].width as u64 * elements[i].height as u64) < size_limit
            });
            let Some(i) = candidate else {
                break;
            };

            let element = &mut elements[i];
            match layout.add_element(element.width, element.height) {
                Some((x, y)) => {
                    element.x = x;
                    element.y = y;
                    element.page = page_index;
                    placed[i] = true;
                    remaining -= 1;
                }
                None => size_limit = element.width as u64 * element.height as u64,
            }
        }

        pages.push(AtlasPage {
            width: layout.width(),
            height: layout.height(),
        });
    }

    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_disjoint(rects: &[Rect2I]) {
        for (i, a) in rects.iter().enumerate() {
            for b in &rects[i + 1..] {
                assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
            }
        }
    }

    /// Mixed sizes from a fixed linear congruential sequence.
    fn mixed_sizes(count: usize) -> Vec<(u32, u32)> {
        let mut state = 0x2545_f491_u32;
        let mut next = move || {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            8 + (state >> 16) % 89
        };
        (0..count).map(|_| (next(), next())).collect()
    }

    fn place_all(layout: &mut TextureAtlasLayout, sizes: &[(u32, u32)]) -> Vec<Option<(u32, u32)>> {
        sizes.iter().map(|&(w, h)| layout.add_element(w, h)).collect()
    }

    #[test]
    fn two_squares_and_a_large_square_fit_without_growth() {
        let mut layout = TextureAtlasLayout::new(256, 256, 256, 256, false);
        let a = layout.add_element(64, 64).unwrap();
        let b = layout.add_element(64, 64).unwrap();
        let c = layout.add_element(128, 128).unwrap();

        assert_eq!(a, (0, 0));
        assert_eq!(b, (64, 0));
        assert_eq!(c, (0, 64));
        assert!(layout.width() <= 256 && layout.height() <= 256);
        assert_disjoint(&[
            Rect2I::new(a.0 as i32, a.1 as i32, 64, 64),
            Rect2I::new(b.0 as i32, b.1 as i32, 64, 64),
            Rect2I::new(c.0 as i32, c.1 as i32, 128, 128),
        ]);
    }

    #[test]
    fn layout_grows_only_when_needed() {
        let mut layout = TextureAtlasLayout::new(64, 64, 512, 512, false);
        assert_eq!(layout.add_element(64, 64), Some((0, 0)));
        assert_eq!((layout.width(), layout.height()), (64, 64));

        layout.add_element(32, 32).unwrap();
        assert!(layout.width() > 64 || layout.height() > 64);
        assert!(layout.width() <= 512 && layout.height() <= 512);
    }

    #[test]
    fn pow2_snaps_running_size() {
        let mut layout = TextureAtlasLayout::new(1, 1, 1024, 1024, true);
        layout.add_element(100, 30).unwrap();
        assert!(layout.width().is_power_of_two());
        assert!(layout.height().is_power_of_two());
        assert!(layout.width() >= 100 && layout.height() >= 30);
    }

    #[test]
    fn oversized_and_zero_sized_elements() {
        let mut layout = TextureAtlasLayout::new(128, 128, 128, 128, false);
        assert_eq!(layout.add_element(129, 10), None);
        assert_eq!(layout.add_element(0, 50), Some((0, 0)));
        assert!(layout.is_empty());
    }

    #[test]
    fn clear_resets_to_single_root() {
        let mut layout = TextureAtlasLayout::new(32, 32, 256, 256, false);
        layout.add_element(100, 100).unwrap();
        assert!(!layout.is_empty());
        layout.clear();
        assert!(layout.is_empty());
        assert_eq!((layout.width(), layout.height()), (32, 32));
        assert_eq!(layout.add_element(256, 256), Some((0, 0)));
    }

    #[test]
    fn batch_spills_onto_new_pages() {
        let mut elements = vec![AtlasElement::new(200, 200); 3];
        let pages = create_atlas_layout(&mut elements, 256, 256, 256, 256, false);
        assert_eq!(pages.len(), 3);
        let mut used: Vec<u32> = elements.iter().map(|e| e.page).collect();
        used.sort_unstable();
        assert_eq!(used, vec![0, 1, 2]);
    }

    #[test]
    fn batch_with_oversized_element_returns_nothing() {
        let mut elements = vec![AtlasElement::new(16, 16), AtlasElement::new(300, 8)];
        assert!(create_atlas_layout(&mut elements, 256, 256, 256, 256, false).is_empty());
    }

    #[test]
    fn uv_rect_is_relative_to_page() {
        let element = AtlasElement {
            width: 64,
            height: 32,
            x: 128,
            y: 0,
            page: 0,
        };
        let uv = element.uv_rect(&AtlasPage {
            width: 256,
            height: 128,
        });
        assert_eq!(uv, Rect2 { x: 0.5, y: 0.0, width: 0.25, height: 0.25 });
    }

    #[test]
    fn same_sequence_gives_same_positions() {
        let sizes = mixed_sizes(80);
        let mut first = TextureAtlasLayout::new(64, 64, 1024, 1024, true);
        let mut second = TextureAtlasLayout::new(64, 64, 1024, 1024, true);

        let a = place_all(&mut first, &sizes);
        let b = place_all(&mut second, &sizes);
        assert_eq!(a, b);
        assert_eq!((first.width(), first.height()), (second.width(), second.height()));

        first.clear();
        assert_eq!(place_all(&mut first, &sizes), a);
    }

    #[test]
    fn mixed_sizes_never_overlap() {
        let sizes = mixed_sizes(120);
        let mut layout = TextureAtlasLayout::new(32, 32, 1024, 1024, false);

        let mut rects = Vec::new();
        for (&(w, h), placed) in sizes.iter().zip(place_all(&mut layout, &sizes)) {
            let Some((x, y)) = placed else {
                continue;
            };
            assert!(x + w <= layout.width() && y + h <= layout.height());
            assert!(layout.width() <= 1024 && layout.height() <= 1024);
            rects.push(Rect2I::new(x as i32, y as i32, w, h));
        }
        assert!(rects.len() > 40, "only {} of {} placed", rects.len(), sizes.len());
        assert_disjoint(&rects);
    }

    #[test]
    fn batch_of_mixed_sizes_places_every_element_inside_its_page() {
        let mut elements: Vec<AtlasElement> = mixed_sizes(150)
            .into_iter()
            .map(|(w, h)| AtlasElement::new(w, h))
            .collect();
        let pages = create_atlas_layout(&mut elements, 64, 64, 512, 512, true);

        assert!(pages.len() > 1);
        for page in &pages {
            assert!(page.width <= 512 && page.height <= 512);
        }
        for element in &elements {
            let page = &pages[element.page as usize];
            assert!(
                element.x + element.width <= page.width && element.y + element.height <= page.height,
                "{element:?} outside {page:?}"
            );
        }
        for index in 0..pages.len() as u32 {
            let rects: Vec<Rect2I> = elements
                .iter()
                .filter(|e| e.page == index)
                .map(AtlasElement::region)
                .collect();
            assert!(!rects.is_empty(), "page {index} is empty");
            assert_disjoint(&rects);
        }
    }
}
