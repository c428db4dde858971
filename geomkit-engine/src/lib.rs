pub mod analysis;
pub mod calculator;
pub mod command;
pub mod construction;
pub mod naming;

pub mod errors {
    use geomkit_core::store::StoreError;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error(transparent)]
        Store(#[from] StoreError),
        #[error("vector {slot} is invalid: {reason}")]
        InvalidVectorInput { slot: usize, reason: String },
        #[error("could not generate a free name for prefix '{0}'")]
        NameExhausted(String),
        #[error("result of '{operation}' is not a finite number")]
        NonFiniteResult { operation: String },
    }
}

pub mod session {
    use geomkit_config::{AnalysisConfig, AppConfig, CalculatorConfig, NamingConfig};
    use geomkit_core::store::{Appearance, GeometryStore, NamespaceRemoval, StoreSummary};
    use tracing::{debug, info};

    use crate::analysis::{RelationAnalyzer, RelationSet};
    use crate::errors::EngineError;
    use crate::naming::{NameGenerator, SequentialNames};

    const MAX_NAME_ATTEMPTS: usize = 1_000;

    /// 会话持有唯一的几何存储以及派生名称来源、分析与计算参数。
    ///
    /// 会话不做内部加锁；多线程宿主需要自行互斥访问。
    #[derive(Debug)]
    pub struct Session {
        store: GeometryStore,
        names: Box<dyn NameGenerator>,
        analysis: AnalysisConfig,
        naming: NamingConfig,
        calculator: CalculatorConfig,
    }

    impl Session {
        pub fn new() -> Self {
            Self::with_config(&AppConfig::default())
        }

        pub fn with_config(config: &AppConfig) -> Self {
            Self {
                store: GeometryStore::with_segment_separator(&config.naming.segment_separator),
                names: Box::new(SequentialNames::new()),
                analysis: config.analysis,
                naming: config.naming.clone(),
                calculator: config.calculator.clone(),
            }
        }

        /// 替换派生名称来源。
        pub fn with_name_generator(mut self, names: impl NameGenerator + 'static) -> Self {
            self.names = Box::new(names);
            self
        }

        /// 清空存储，保留配置与名称来源。
        pub fn reset(&mut self) {
            self.store = GeometryStore::with_segment_separator(&self.naming.segment_separator);
            info!("会话已重置");
        }

        #[inline]
        pub fn store(&self) -> &GeometryStore {
            &self.store
        }

        #[inline]
        pub fn store_mut(&mut self) -> &mut GeometryStore {
            &mut self.store
        }

        #[inline]
        pub fn analysis_config(&self) -> AnalysisConfig {
            self.analysis
        }

        #[inline]
        pub fn set_analysis_config(&mut self, analysis: AnalysisConfig) {
            self.analysis = analysis;
        }

        #[inline]
        pub fn naming(&self) -> &NamingConfig {
            &self.naming
        }

        #[inline]
        pub fn calculator_config(&self) -> &CalculatorConfig {
            &self.calculator
        }

        /// 按当前容差分析所有线段对的关系。
        pub fn analyze(&self) -> Result<RelationSet, EngineError> {
            RelationAnalyzer::from_config(&self.analysis).analyze(&self.store)
        }

        /// 各类实体计数，临时点与结果点计为计算点。
        pub fn summary(&self) -> StoreSummary {
            self.store
                .summary(&[&self.naming.temp_prefix, &self.naming.result_prefix])
        }

        /// 清除全部待显示向量以及临时点、结果点。
        pub fn clear_calculations(&mut self) -> NamespaceRemoval {
            let cleared_vectors = self.store.clear_displayed_vectors();
            let mut removal = self.store.clear_namespace(&self.naming.temp_prefix);
            let results = self.store.clear_namespace(&self.naming.result_prefix);
            removal.points.extend(results.points);
            removal.dependents.segments.extend(results.dependents.segments);
            removal.dependents.circles.extend(results.dependents.circles);
            removal.dependents.displayed_vectors.extend(results.dependents.displayed_vectors);
            removal.dependents.displayed_vectors.extend(cleared_vectors);
            debug!(points = removal.points.len(), "已清除计算结果");
            removal
        }

        /// 生成在点与圆命名空间内都未被占用的名称。
        pub(crate) fn fresh_name(&mut self, prefix: &str) -> Result<String, EngineError> {
            self.fresh_name_where(prefix, |_, _| true)
        }

        /// 同 [`Session::fresh_name`]，并额外要求 `is_free` 对候选名称成立。
        pub(crate) fn fresh_name_where(
            &mut self,
            prefix: &str,
            is_free: impl Fn(&GeometryStore, &str) -> bool,
        ) -> Result<String, EngineError> {
            for _ in 0..MAX_NAME_ATTEMPTS {
                let candidate = self.names.next_name(prefix);
                let taken = self.store.contains_point(&candidate)
                    || self.store.circle(&candidate).is_some();
                if !taken && is_free(&self.store, &candidate) {
                    return Ok(candidate);
                }
                debug!(candidate = %candidate, "候选名称已被占用，重新生成");
            }
            Err(EngineError::NameExhausted(prefix.to_string()))
        }

        /// 载入示例数据：原点、三条坐标轴方向上的点和两个空间点，以及六条线段。
        pub fn populate_sample(&mut self) -> Result<(), EngineError> {
            self.reset();
            let store = &mut self.store;
            store.add_point("O", 0, 0, 0)?;
            store.add_point("A", 3, 0, 0)?;
            store.add_point("B", 0, 3, 0)?;
            store.add_point("C", 0, 0, 3)?;
            store.add_point("D", 2, 2, 2)?;
            store.add_point("E", 1, 2, 3)?;

            store.add_segment("O", "A", Appearance::new("#FF0000", "solid"))?;
            store.add_segment("O", "B", Appearance::new("#00FF00", "solid"))?;
            store.add_segment("O", "C", Appearance::new("#0000FF", "solid"))?;
            store.add_segment("O", "D", Appearance::new("#FF00FF", "dashed"))?;
            store.add_segment("A", "B", Appearance::new("#FFA500", "dotted"))?;
            store.add_segment("A", "C", Appearance::new("#800080", "dashdot"))?;

            info!(
                points = store.point_count(),
                segments = store.segment_count(),
                "已载入示例数据"
            );
            Ok(())
        }
    }

    impl Default for Session {
        fn default() -> Self {
            Self::new()
        }
    }

}
