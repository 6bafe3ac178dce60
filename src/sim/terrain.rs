//! Procedural terrain streaming
//!
//! Terrain is cut into fixed-width segments aligned to multiples of
//! `segment_width`. Every segment draws from its own stream seeded with
//! `seed + index`, so any segment can be rebuilt on its own, in any order,
//! and come out bit-identical.
//!
//! Boundary heights ("anchors") are a pure function of the boundary index.
//! A segment walks from its left anchor with exponential smoothing and is
//! then bent onto its right anchor, so neighbouring segments always share
//! the exact same boundary height.

use std::collections::{BTreeMap, HashMap};

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::geometry::{PolygonDecomposer, StripDecomposer, interpolate_height};
use super::physics::{BodyDesc, BodyHandle, BodyShape, CollisionTag};
use super::rng::SeededRng;

/// Terrain tunables (world units are pixels, y up)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Width of one segment
    pub segment_width: f64,
    /// Top-surface samples per segment (vertices = points + 1)
    pub points_per_segment: usize,
    /// Mean ground height
    pub base_height: f64,
    /// Lowest variation drawn around `base_height` at zero difficulty
    pub min_height_variation: f64,
    /// Highest variation drawn around `base_height` at zero difficulty
    pub max_height_variation: f64,
    /// Blend factor toward each new target height (0..1)
    pub smoothing: f64,
    /// Difficulty gained per world unit travelled
    pub difficulty_ramp: f64,
    /// Difficulty never exceeds this
    pub difficulty_cap: f64,
    /// Depth of the collision polygon below the surface
    pub ground_thickness: f64,
    /// Level runway at the start of the track
    pub flat_start_width: f64,
    /// Quantization step of the height cache
    pub height_cache_grid: f64,
    /// Surface friction
    pub friction: f64,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            segment_width: 800.0,
            points_per_segment: 16,
            base_height: 240.0,
            min_height_variation: -90.0,
            max_height_variation: 150.0,
            smoothing: 0.3,
            difficulty_ramp: 0.000_04,
            difficulty_cap: 2.0,
            ground_thickness: 400.0,
            flat_start_width: 600.0,
            height_cache_grid: 10.0,
            friction: 0.9,
        }
    }
}

impl TerrainConfig {
    /// Basic clamping so generation can't divide by zero or walk backwards
    pub fn sanitize(&mut self) {
        if !(self.segment_width > 1.0) {
            self.segment_width = 1.0;
        }
        self.points_per_segment = self.points_per_segment.max(1);
        if self.min_height_variation > self.max_height_variation {
            std::mem::swap(&mut self.min_height_variation, &mut self.max_height_variation);
        }
        self.smoothing = self.smoothing.clamp(0.0, 1.0);
        self.difficulty_ramp = self.difficulty_ramp.max(0.0);
        self.difficulty_cap = self.difficulty_cap.max(0.0);
        self.ground_thickness = self.ground_thickness.max(1.0);
        self.flat_start_width = self.flat_start_width.max(0.0);
        if !(self.height_cache_grid > 0.0) {
            self.height_cache_grid = 10.0;
        }
        self.friction = self.friction.max(0.0);
    }

    /// Difficulty factor at `x`, zero behind the origin
    pub fn difficulty_at(&self, x: f64) -> f64 {
        (x.max(0.0) * self.difficulty_ramp).min(self.difficulty_cap)
    }

    /// Largest single-step height change the smoothing walk can produce
    pub fn max_smoothing_step(&self) -> f64 {
        let spread = (self.max_height_variation - self.min_height_variation).abs()
            + self.max_height_variation.abs().max(self.min_height_variation.abs());
        spread * (1.0 + self.difficulty_cap) * self.smoothing.max(f64::EPSILON)
    }
}

/// A fixed-width slice of ground with its own collision geometry
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainSegment {
    pub index: i64,
    pub start_x: f64,
    pub end_x: f64,
    /// Surface vertices, left to right; first.x == start_x, last.x == end_x
    pub top_vertices: Vec<DVec2>,
    /// Convex pieces of the closed ground polygon
    pub convex_parts: Vec<Vec<DVec2>>,
    /// Static collision body, once the simulation has added one
    pub body: Option<BodyHandle>,
}

impl TerrainSegment {
    /// Closed polygon: top chain left to right, then the bottom chain back
    pub fn polygon(&self, ground_thickness: f64) -> Vec<DVec2> {
        let mut polygon = self.top_vertices.clone();
        polygon.extend(
            self.top_vertices
                .iter()
                .rev()
                .map(|v| DVec2::new(v.x, v.y - ground_thickness)),
        );
        polygon
    }

    pub fn height_at(&self, x: f64) -> Option<f64> {
        if x < self.start_x || x > self.end_x {
            return None;
        }
        interpolate_height(&self.top_vertices, x)
    }

    /// Static ground body description for the physics world
    pub fn body_desc(&self, friction: f64) -> BodyDesc {
        let mut desc = BodyDesc::fixed(
            DVec2::ZERO,
            BodyShape::ConvexParts(self.convex_parts.clone()),
            CollisionTag::Ground,
        );
        desc.friction = friction;
        desc
    }
}

/// Quantized x → ground height memo
#[derive(Debug, Clone, Default)]
pub struct HeightCache {
    grid: f64,
    entries: HashMap<i64, f64>,
}

impl HeightCache {
    pub fn new(grid: f64) -> Self {
        Self {
            grid,
            entries: HashMap::new(),
        }
    }

    #[inline]
    pub fn key(&self, x: f64) -> i64 {
        (x / self.grid).round() as i64
    }

    #[inline]
    pub fn grid_x(&self, key: i64) -> f64 {
        key as f64 * self.grid
    }

    pub fn get(&self, key: i64) -> Option<f64> {
        self.entries.get(&key).copied()
    }

    pub fn insert(&mut self, key: i64, height: f64) {
        self.entries.insert(key, height);
    }

    /// Drop every entry left of `x`
    pub fn remove_before(&mut self, x: f64) {
        let grid = self.grid;
        self.entries.retain(|&k, _| k as f64 * grid >= x);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Generates, owns and evicts terrain segments for one seed
pub struct TerrainGenerator {
    seed: u32,
    config: TerrainConfig,
    decomposer: Box<dyn PolygonDecomposer>,
    segments: BTreeMap<i64, TerrainSegment>,
    cache: HeightCache,
    frontier: Option<f64>,
}

impl TerrainGenerator {
    pub fn new(seed: u32, mut config: TerrainConfig) -> Self {
        config.sanitize();
        let cache = HeightCache::new(config.height_cache_grid);
        Self {
            seed,
            config,
            decomposer: Box::new(StripDecomposer),
            segments: BTreeMap::new(),
            cache,
            frontier: None,
        }
    }

    /// Swap the convex decomposition strategy
    pub fn with_decomposer(mut self, decomposer: Box<dyn PolygonDecomposer>) -> Self {
        self.decomposer = decomposer;
        self
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// Furthest x generated so far
    pub fn frontier(&self) -> Option<f64> {
        self.frontier
    }

    pub fn segment(&self, index: i64) -> Option<&TerrainSegment> {
        self.segments.get(&index)
    }

    /// Live segments, left to right
    pub fn segments(&self) -> impl Iterator<Item = &TerrainSegment> {
        self.segments.values()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn cache(&self) -> &HeightCache {
        &self.cache
    }

    #[inline]
    pub fn segment_index(&self, x: f64) -> i64 {
        (x / self.config.segment_width).floor() as i64
    }

    fn segment_rng(&self, index: i64) -> SeededRng {
        SeededRng::new(self.seed.wrapping_add(index as u32))
    }

    fn is_flat(&self, x: f64) -> bool {
        x <= self.config.flat_start_width
    }

    /// Target height at `x`; consumes exactly one draw
    fn target_height(&self, x: f64, rng: &mut SeededRng) -> f64 {
        let c = &self.config;
        let variation = rng.draw_range(c.min_height_variation, c.max_height_variation);
        c.base_height + variation * (1.0 + c.difficulty_at(x))
    }

    /// Boundary height at the left edge of segment `index`.
    /// Uses the first draw of that segment's stream.
    fn anchor_height(&self, index: i64, rng: &mut SeededRng) -> f64 {
        let x = index as f64 * self.config.segment_width;
        let target = self.target_height(x, rng);
        if self.is_flat(x) {
            self.config.base_height
        } else {
            self.config.base_height + (target - self.config.base_height) * 0.5
        }
    }

    /// Build segment `index` from scratch. Pure in (seed, config, index).
    fn build_segment(&self, index: i64) -> TerrainSegment {
        let c = &self.config;
        let points = c.points_per_segment;
        let start_x = index as f64 * c.segment_width;
        let end_x = (index + 1) as f64 * c.segment_width;
        let step = c.segment_width / points as f64;

        let mut rng = self.segment_rng(index);
        let start_height = self.anchor_height(index, &mut rng);
        let end_height = self.anchor_height(index + 1, &mut self.segment_rng(index + 1));

        let mut xs = Vec::with_capacity(points + 1);
        let mut heights = Vec::with_capacity(points + 1);
        xs.push(start_x);
        heights.push(start_height);

        let mut running = start_height;
        for k in 1..=points {
            let x = if k == points {
                end_x
            } else {
                start_x + k as f64 * step
            };
            let target = self.target_height(x, &mut rng);
            running += (target - running) * c.smoothing;
            if self.is_flat(x) {
                running = c.base_height;
            }
            xs.push(x);
            heights.push(running);
        }

        // Bend the walk onto the right anchor, leaving the runway untouched
        let drift = end_height - heights[points];
        let ramp_from = start_x.max(c.flat_start_width);
        if end_x > ramp_from {
            for (x, h) in xs.iter().zip(heights.iter_mut()) {
                if *x > ramp_from {
                    *h += drift * (x - ramp_from) / (end_x - ramp_from);
                }
            }
        }
        heights[points] = end_height;

        let top_vertices: Vec<DVec2> = xs
            .into_iter()
            .zip(heights)
            .map(|(x, y)| DVec2::new(x, y))
            .collect();
        debug_assert!(top_vertices.iter().all(|v| v.y.is_finite()));

        let mut segment = TerrainSegment {
            index,
            start_x,
            end_x,
            top_vertices,
            convex_parts: Vec::new(),
            body: None,
        };
        let polygon = segment.polygon(c.ground_thickness);
        segment.convex_parts = self.decomposer.decompose(&polygon);
        segment
    }

    fn cache_segment(&mut self, segment: &TerrainSegment) {
        let first = (segment.start_x / self.cache.grid).ceil() as i64;
        let last = (segment.end_x / self.cache.grid).floor() as i64;
        for key in first..=last {
            let x = self.cache.grid_x(key);
            if let Some(h) = interpolate_height(&segment.top_vertices, x) {
                self.cache.insert(key, h);
            }
        }
    }

    /// Make sure every segment overlapping `[start_x, end_x)` exists and
    /// return them in order. The window is widened to segment boundaries, so
    /// adjacent calls never leave gaps. An empty or inverted window returns
    /// nothing.
    pub fn generate_segments(&mut self, start_x: f64, end_x: f64) -> Vec<&TerrainSegment> {
        if !(end_x > start_x) {
            return Vec::new();
        }
        let first = self.segment_index(start_x);
        let last = (end_x / self.config.segment_width).ceil() as i64;

        for index in first..last {
            if self.segments.contains_key(&index) {
                continue;
            }
            let segment = self.build_segment(index);
            self.cache_segment(&segment);
            log::trace!(
                "Generated terrain segment {} [{:.0}, {:.0})",
                index,
                segment.start_x,
                segment.end_x
            );
            self.frontier = Some(self.frontier.map_or(segment.end_x, |f| f.max(segment.end_x)));
            self.segments.insert(index, segment);
        }

        self.segments.range(first..last).map(|(_, s)| s).collect()
    }

    /// Record the physics body created for a segment
    pub fn attach_body(&mut self, index: i64, body: BodyHandle) {
        if let Some(segment) = self.segments.get_mut(&index) {
            segment.body = Some(body);
        }
    }

    /// Ground height at `x`, quantized to the cache grid.
    ///
    /// Served from the cache when possible; otherwise interpolated from the
    /// live segment (or a throwaway rebuild) and memoized.
    pub fn height_at(&mut self, x: f64) -> f64 {
        let key = self.cache.key(x);
        if let Some(h) = self.cache.get(key) {
            return h;
        }
        let h = self.exact_height_at(self.cache.grid_x(key));
        self.cache.insert(key, h);
        h
    }

    /// Ground height at exactly `x`, bypassing the cache
    pub fn exact_height_at(&self, x: f64) -> f64 {
        let index = self.segment_index(x);
        let height = match self.segments.get(&index) {
            Some(segment) => interpolate_height(&segment.top_vertices, x),
            None => interpolate_height(&self.build_segment(index).top_vertices, x),
        };
        height.unwrap_or(self.config.base_height)
    }

    /// Evict segments that end at or before `x`. Returns them so the caller
    /// can remove their bodies.
    pub fn evict_before(&mut self, x: f64) -> Vec<TerrainSegment> {
        let doomed: Vec<i64> = self
            .segments
            .values()
            .take_while(|s| s.end_x <= x)
            .map(|s| s.index)
            .collect();
        if doomed.is_empty() {
            return Vec::new();
        }
        let evicted: Vec<TerrainSegment> = doomed
            .into_iter()
            .filter_map(|i| self.segments.remove(&i))
            .collect();
        if let Some(last) = evicted.last() {
            self.cache.remove_before(last.end_x);
        }
        log::trace!("Evicted {} terrain segments behind x={:.0}", evicted.len(), x);
        evicted
    }

    /// Forget everything. Regenerating afterwards reproduces identical
    /// segments for the same seed.
    pub fn reset(&mut self) -> Vec<TerrainSegment> {
        self.cache.clear();
        self.frontier = None;
        std::mem::take(&mut self.segments).into_values().collect()
    }
}

impl std::fmt::Debug for TerrainGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerrainGenerator")
            .field("seed", &self.seed)
            .field("segments", &self.segments.len())
            .field("cache", &self.cache.len())
            .field("frontier", &self.frontier)
            .finish()
    }
}
