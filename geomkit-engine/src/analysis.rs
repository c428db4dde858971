//! 线段两两关系分析：垂直、平行、长度比、长度相等与长度差。

use std::fmt;

use geomkit_config::AnalysisConfig;
use geomkit_core::geometry::Vector3;
use geomkit_core::store::GeometryStore;
use serde::Serialize;
use tracing::debug;

use crate::errors::EngineError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentPair {
    pub first: String,
    pub second: String,
}

/// 带数值的线段对：长度比为 `|first| / |second|`，长度差为 `||first| - |second||`。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasuredPair {
    pub first: String,
    pub second: String,
    pub value: f64,
}

/// 分析结果。各列表按线段插入顺序生成的 (i, j), i < j 顺序排列。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RelationSet {
    pub perpendicular: Vec<SegmentPair>,
    pub parallel: Vec<SegmentPair>,
    pub length_ratio: Vec<MeasuredPair>,
    pub length_equal: Vec<SegmentPair>,
    pub length_difference: Vec<MeasuredPair>,
    /// 第二条线段长度为零、长度比无定义而跳过的线段对。
    pub skipped_ratios: Vec<SegmentPair>,
}

impl RelationSet {
    pub fn is_empty(&self) -> bool {
        self.perpendicular.is_empty()
            && self.parallel.is_empty()
            && self.length_ratio.is_empty()
            && self.length_equal.is_empty()
            && self.length_difference.is_empty()
    }

    pub fn is_perpendicular(&self, first: &str, second: &str) -> bool {
        contains_pair(&self.perpendicular, first, second)
    }

    pub fn is_parallel(&self, first: &str, second: &str) -> bool {
        contains_pair(&self.parallel, first, second)
    }

    pub fn has_equal_length(&self, first: &str, second: &str) -> bool {
        contains_pair(&self.length_equal, first, second)
    }

    pub fn ratio(&self, first: &str, second: &str) -> Option<f64> {
        find_measured(&self.length_ratio, first, second)
    }

    pub fn difference(&self, first: &str, second: &str) -> Option<f64> {
        find_measured(&self.length_difference, first, second)
    }
}

fn contains_pair(pairs: &[SegmentPair], first: &str, second: &str) -> bool {
    pairs
        .iter()
        .any(|pair| pair.first == first && pair.second == second)
}

fn find_measured(pairs: &[MeasuredPair], first: &str, second: &str) -> Option<f64> {
    pairs
        .iter()
        .find(|pair| pair.first == first && pair.second == second)
        .map(|pair| pair.value)
}

impl fmt::Display for RelationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "几何关系分析结果")?;
        if self.is_empty() {
            return writeln!(f, "未检测到几何关系");
        }
        if !self.perpendicular.is_empty() {
            writeln!(f, "[垂直]")?;
            for pair in &self.perpendicular {
                writeln!(f, "  {} ⊥ {}", pair.first, pair.second)?;
            }
        }
        if !self.parallel.is_empty() {
            writeln!(f, "[平行]")?;
            for pair in &self.parallel {
                writeln!(f, "  {} ∥ {}", pair.first, pair.second)?;
            }
        }
        if !self.length_ratio.is_empty() {
            writeln!(f, "[长度比]")?;
            for pair in &self.length_ratio {
                writeln!(f, "  {} : {} = {}:1", pair.first, pair.second, pair.value)?;
            }
        }
        if !self.length_equal.is_empty() {
            writeln!(f, "[长度相等]")?;
            for pair in &self.length_equal {
                writeln!(f, "  |{}| = |{}|", pair.first, pair.second)?;
            }
        }
        if !self.length_difference.is_empty() {
            writeln!(f, "[长度差]")?;
            for pair in &self.length_difference {
                writeln!(f, "  |{}| - |{}| = {}", pair.first, pair.second, pair.value)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RelationAnalyzer {
    tolerance: f64,
    ratio_decimals: u32,
}

impl RelationAnalyzer {
    pub fn new(tolerance: f64, ratio_decimals: u32) -> Self {
        Self {
            tolerance,
            ratio_decimals,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.tolerance, config.ratio_decimals)
    }

    #[inline]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// 先按插入顺序求出全部线段向量，再逐对分类。任一线段端点缺失时整体失败。
    pub fn analyze(&self, store: &GeometryStore) -> Result<RelationSet, EngineError> {
        let vectors = store
            .segments()
            .map(|segment| {
                store
                    .segment_vector(&segment.name)
                    .map(|vector| (segment.name.clone(), vector))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.analyze_vectors(&vectors))
    }

    /// 对已求出的 (名称, 向量) 序列做分类，不读取存储。
    pub fn analyze_vectors(&self, vectors: &[(String, Vector3)]) -> RelationSet {
        let mut relations = RelationSet::default();
        let eps = self.tolerance;

        for (i, j) in candidate_pairs(vectors.len()) {
            let (first, v1) = &vectors[i];
            let (second, v2) = &vectors[j];
            let pair = || SegmentPair {
                first: first.clone(),
                second: second.clone(),
            };

            if v1.dot(*v2).abs() < eps {
                relations.perpendicular.push(pair());
            }
            if v1.cross(*v2).magnitude() < eps {
                relations.parallel.push(pair());
            }

            let (ratio, difference) = compare_lengths(*v1, *v2);
            match ratio {
                Some(ratio) => relations.length_ratio.push(MeasuredPair {
                    first: first.clone(),
                    second: second.clone(),
                    value: round_to(ratio, self.ratio_decimals),
                }),
                None => relations.skipped_ratios.push(pair()),
            }

            if difference < eps {
                relations.length_equal.push(pair());
            } else {
                relations.length_difference.push(MeasuredPair {
                    first: first.clone(),
                    second: second.clone(),
                    value: difference,
                });
            }
        }

        debug!(
            segments = vectors.len(),
            perpendicular = relations.perpendicular.len(),
            parallel = relations.parallel.len(),
            skipped_ratios = relations.skipped_ratios.len(),
            "关系分析完成"
        );
        relations
    }
}

impl Default for RelationAnalyzer {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

/// 需要比较的线段下标对，按 (i, j), i < j 的字典序产生。
fn candidate_pairs(count: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..count).flat_map(move |i| (i + 1..count).map(move |j| (i, j)))
}

/// 两条线段的 (长度比, 长度差)。第二条为零长度时比值无定义。
///
/// 长度超出浮点范围时改在按两向量最大分量缩放后的坐标系里比较，
/// 比值不受缩放影响，长度差再乘回比例。
fn compare_lengths(v1: Vector3, v2: Vector3) -> (Option<f64>, f64) {
    let len1 = v1.magnitude();
    let len2 = v2.magnitude();
    if len1.is_finite() && len2.is_finite() {
        let ratio = (len2 != 0.0).then(|| len1 / len2);
        return (ratio, (len1 - len2).abs());
    }
    let scale = v1.max_abs().max(v2.max_abs());
    let len1 = Vector3::from(v1.as_vec3() / scale).magnitude();
    let len2 = Vector3::from(v2.as_vec3() / scale).magnitude();
    let ratio = (len2 != 0.0).then(|| len1 / len2);
    let difference = (len1 - len2).abs();
    let difference = if difference == 0.0 { 0.0 } else { difference * scale };
    (ratio, difference)
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use geomkit_core::store::Appearance;

    fn named(name: &str, x: f64, y: f64, z: f64) -> (String, Vector3) {
        (name.to_string(), Vector3::new(x, y, z))
    }

    #[test]
    fn pairs_follow_insertion_order() {
        let pairs: Vec<_> = candidate_pairs(4).collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]);
        assert_eq!(candidate_pairs(1).count(), 0);
        assert_eq!(candidate_pairs(0).count(), 0);
    }

    #[test]
    fn perpendicular_and_equal_axes() {
        let analyzer = RelationAnalyzer::default();
        let relations =
            analyzer.analyze_vectors(&[named("OA", 3.0, 0.0, 0.0), named("OB", 0.0, 3.0, 0.0)]);
        assert!(relations.is_perpendicular("OA", "OB"));
        assert!(!relations.is_perpendicular("OB", "OA"));
        assert!(relations.parallel.is_empty());
        assert!(relations.has_equal_length("OA", "OB"));
        assert_eq!(relations.ratio("OA", "OB"), Some(1.0));
        assert!(relations.length_difference.is_empty());
    }

    #[test]
    fn parallel_uses_full_cross_product() {
        let analyzer = RelationAnalyzer::default();
        // z 分量不同，平面叉积为零但空间上不平行
        let relations =
            analyzer.analyze_vectors(&[named("a", 1.0, 0.0, 0.0), named("b", 2.0, 0.0, 1.0)]);
        assert!(!relations.is_parallel("a", "b"));

        let relations =
            analyzer.analyze_vectors(&[named("a", 1.0, 1.0, 1.0), named("b", -2.0, -2.0, -2.0)]);
        assert!(relations.is_parallel("a", "b"));
        assert_eq!(relations.ratio("a", "b"), Some(0.5));
    }

    #[test]
    fn ratio_is_rounded_to_configured_decimals() {
        let vectors = [named("a", 1.0, 0.0, 0.0), named("b", 3.0, 0.0, 0.0)];
        let relations = RelationAnalyzer::default().analyze_vectors(&vectors);
        assert_eq!(relations.ratio("a", "b"), Some(0.33));

        let relations = RelationAnalyzer::new(1e-6, 4).analyze_vectors(&vectors);
        assert_eq!(relations.ratio("a", "b"), Some(0.3333));
    }

    #[test]
    fn zero_length_segment_is_trivially_related() {
        let analyzer = RelationAnalyzer::default();
        let relations =
            analyzer.analyze_vectors(&[named("AB", 2.0, 1.0, 0.0), named("CC", 0.0, 0.0, 0.0)]);
        assert!(relations.is_perpendicular("AB", "CC"));
        assert!(relations.is_parallel("AB", "CC"));
        assert_eq!(relations.ratio("AB", "CC"), None);
        assert_eq!(relations.skipped_ratios.len(), 1);
        assert!(relations.difference("AB", "CC").is_some());

        // 零长度线段在前时比值为 0，照常记录
        let relations =
            analyzer.analyze_vectors(&[named("CC", 0.0, 0.0, 0.0), named("AB", 2.0, 1.0, 0.0)]);
        assert_eq!(relations.ratio("CC", "AB"), Some(0.0));
        assert!(relations.skipped_ratios.is_empty());
    }

    #[test]
    fn huge_lengths_never_produce_nan() {
        let analyzer = RelationAnalyzer::default();
        let relations = analyzer.analyze_vectors(&[
            named("AB", 1e200, 0.0, 0.0),
            named("AC", 0.0, 1e200, 0.0),
            named("AD", 1.5e308, 1.5e308, 0.0),
        ]);
        assert!(relations.is_perpendicular("AB", "AC"));
        assert!(relations.has_equal_length("AB", "AC"));
        assert_eq!(relations.ratio("AB", "AC"), Some(1.0));
        assert_eq!(relations.ratio("AB", "AD"), Some(0.0));
        for measured in relations.length_ratio.iter().chain(&relations.length_difference) {
            assert!(!measured.value.is_nan(), "{measured:?}");
        }
        assert!(relations.difference("AB", "AD").unwrap() > 0.0);
    }

    #[test]
    fn tolerance_controls_classification() {
        let vectors = [named("a", 1.0, 0.0, 0.0), named("b", 1e-4, 1.0, 0.0)];
        assert!(
            !RelationAnalyzer::default()
                .analyze_vectors(&vectors)
                .is_perpendicular("a", "b")
        );
        assert!(
            RelationAnalyzer::new(1e-3, 2)
                .analyze_vectors(&vectors)
                .is_perpendicular("a", "b")
        );
    }

    #[test]
    fn analyze_reads_store_in_insertion_order() {
        let mut store = GeometryStore::new();
        store.add_point("A", 0, 0, 0).unwrap();
        store.add_point("B", 4, 0, 0).unwrap();
        store.add_point("C", 0, 0, 0).unwrap();
        store.add_point("D", 2, 0, 0).unwrap();
        store.add_segment("C", "D", Appearance::default()).unwrap();
        store.add_segment("A", "B", Appearance::default()).unwrap();

        let relations = RelationAnalyzer::default().analyze(&store).unwrap();
        assert_eq!(relations.ratio("CD", "AB"), Some(0.5));
        assert_eq!(relations.difference("CD", "AB"), Some(2.0));
        assert!(relations.ratio("AB", "CD").is_none());
    }

    #[test]
    fn empty_store_has_no_relations() {
        let mut store = GeometryStore::new();
        let relations = RelationAnalyzer::default().analyze(&store).unwrap();
        assert!(relations.is_empty());

        store.add_point("A", 0, 0, 0).unwrap();
        store.add_point("B", 1, 0, 0).unwrap();
        store.add_segment("A", "B", Appearance::default()).unwrap();
        let relations = RelationAnalyzer::default().analyze(&store).unwrap();
        assert!(relations.is_empty());
        assert!(relations.skipped_ratios.is_empty());
    }

    #[test]
    fn display_lists_sections() {
        let relations = RelationAnalyzer::default()
            .analyze_vectors(&[named("OA", 3.0, 0.0, 0.0), named("OB", 0.0, 3.0, 0.0)]);
        let text = relations.to_string();
        assert!(text.contains("OA ⊥ OB"));
        assert!(text.contains("|OA| = |OB|"));
        assert!(!text.contains("[平行]"));
        assert!(RelationSet::default().to_string().contains("未检测到"));
    }
}
