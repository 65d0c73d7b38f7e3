//! The scroll, dedup and extract loop.
//!
//! The collector repeatedly reads the product cards currently on screen,
//! keeps the ones whose content description has not been seen before in this
//! run, parses them into [`ProductRecord`]s and swipes to reveal more. It
//! stops when the target count is reached or when `stagnation_limit`
//! consecutive iterations turn up nothing new.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::ElementError;
use crate::product::{ProductRecord, image_path_for, parse_description};

/// What the collector needs from the screen it is scraping.
///
/// Element handles are only valid for the screen they were listed from; the
/// collector never keys anything on them.
#[allow(async_fn_in_trait)]
pub trait ListingSource {
    type Element;

    /// Product cards currently visible, in on-screen order.
    async fn visible_elements(&mut self) -> Result<Vec<Self::Element>, ElementError>;

    /// Raw content description of a card, `None` when the attribute is absent.
    async fn description(&mut self, element: &Self::Element)
    -> Result<Option<String>, ElementError>;

    /// Save a snapshot of the card to `path`.
    async fn capture(&mut self, element: &Self::Element, path: &Path) -> Result<(), ElementError>;

    /// Primary scroll gesture.
    async fn swipe_up(&mut self) -> Result<(), ElementError>;

    /// Coordinate based swipe used when the primary gesture is unavailable.
    async fn swipe_by_coordinates(&mut self) -> Result<(), ElementError>;
}

#[derive(Debug, Clone)]
pub struct CollectorOptions {
    pub target_count: usize,
    pub stagnation_limit: u32,
    /// Pause after every scroll so the list can settle.
    pub settle: Duration,
    pub images_dir: PathBuf,
    pub sanitized_names: bool,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            target_count: 10,
            stagnation_limit: 3,
            settle: Duration::from_secs(2),
            images_dir: PathBuf::from("product_images"),
            sanitized_names: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    TargetReached,
    Stagnated,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::TargetReached => write!(f, "target reached"),
            StopReason::Stagnated => write!(f, "no new products"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOutcome {
    Swiped,
    FellBack,
    Failed,
}

#[derive(Debug, Clone)]
pub struct CollectReport {
    pub records: Vec<ProductRecord>,
    pub stop_reason: StopReason,
    pub iterations: u32,
    pub fallback_scrolls: u32,
    pub failed_scrolls: u32,
}

/// Loop state for one run. Dropped when the run ends.
#[derive(Debug)]
pub struct CollectorState {
    records: Vec<ProductRecord>,
    seen: HashSet<String>,
    stagnation: u32,
    target: usize,
    iterations: u32,
}

impl CollectorState {
    pub fn new(target: usize) -> Self {
        Self {
            records: Vec::with_capacity(target.min(256)),
            seen: HashSet::new(),
            stagnation: 0,
            target,
            iterations: 0,
        }
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.target
    }

    pub fn should_continue(&self, stagnation_limit: u32) -> bool {
        !self.is_full() && self.stagnation < stagnation_limit
    }

    /// Returns `true` if `desc` had not been seen before.
    pub fn mark_seen(&mut self, desc: &str) -> bool {
        if self.seen.contains(desc) {
            return false;
        }
        self.seen.insert(desc.to_string())
    }

    pub fn push(&mut self, record: ProductRecord) {
        self.records.push(record);
    }

    /// 1-based position the next record will take.
    pub fn next_index(&self) -> usize {
        self.records.len() + 1
    }

    pub fn end_iteration(&mut self, new_found: usize) {
        if new_found == 0 {
            self.stagnation += 1;
        } else {
            self.stagnation = 0;
        }
    }

    pub fn stagnation(&self) -> u32 {
        self.stagnation
    }
}

pub struct Collector {
    options: CollectorOptions,
}

impl Collector {
    pub fn new(options: CollectorOptions) -> Self {
        Self { options }
    }

    pub async fn collect<S: ListingSource>(&self, source: &mut S) -> CollectReport {
        let mut state = CollectorState::new(self.options.target_count);
        let mut fallback_scrolls = 0;
        let mut failed_scrolls = 0;

        while state.should_continue(self.options.stagnation_limit) {
            state.iterations += 1;
            info!(iteration = state.iterations, "scroll iteration");

            let elements = match source.visible_elements().await {
                Ok(elements) => elements,
                Err(e) => {
                    warn!("{e}");
                    Vec::new()
                }
            };
            info!(visible = elements.len(), "products visible");

            let mut new_found = 0;
            for element in &elements {
                if state.is_full() {
                    break;
                }
                if self.extract(source, element, &mut state).await {
                    new_found += 1;
                }
            }

            state.end_iteration(new_found);
            if new_found == 0 {
                warn!(
                    stagnation = state.stagnation(),
                    "no new products found on this scroll"
                );
            }

            match self.scroll(source).await {
                ScrollOutcome::Swiped => {}
                ScrollOutcome::FellBack => fallback_scrolls += 1,
                ScrollOutcome::Failed => failed_scrolls += 1,
            }

            if !self.options.settle.is_zero() {
                sleep(self.options.settle).await;
            }
        }

        let stop_reason = if state.is_full() {
            StopReason::TargetReached
        } else {
            StopReason::Stagnated
        };
        info!(
            collected = state.records.len(),
            iterations = state.iterations,
            %stop_reason,
            "collection finished"
        );

        CollectReport {
            records: state.records,
            stop_reason,
            iterations: state.iterations,
            fallback_scrolls,
            failed_scrolls,
        }
    }

    /// Returns `true` when the element was new to this run.
    async fn extract<S: ListingSource>(
        &self,
        source: &mut S,
        element: &S::Element,
        state: &mut CollectorState,
    ) -> bool {
        let desc = match source.description(element).await {
            Ok(Some(desc)) if !desc.is_empty() => desc,
            Ok(_) => return false,
            Err(e) => {
                warn!("{e}");
                return false;
            }
        };
        if !state.mark_seen(&desc) {
            debug!(%desc, "already collected");
            return false;
        }

        let parsed = parse_description(&desc);
        let index = state.next_index();
        let path = image_path_for(
            &self.options.images_dir,
            index,
            &parsed.name,
            self.options.sanitized_names,
        );
        if let Err(e) = source.capture(element, &path).await {
            warn!("{e}");
        }

        info!(
            index,
            name = %parsed.name,
            weight = %parsed.weight,
            price = %parsed.price,
            "collected product"
        );
        state.push(parsed.into_record(&path));
        true
    }

    async fn scroll<S: ListingSource>(&self, source: &mut S) -> ScrollOutcome {
        let primary = match source.swipe_up().await {
            Ok(()) => return ScrollOutcome::Swiped,
            Err(e) => e,
        };
        debug!("{primary}, falling back to coordinate swipe");
        match source.swipe_by_coordinates().await {
            Ok(()) => ScrollOutcome::FellBack,
            Err(e) => {
                warn!("{e}");
                ScrollOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, Default)]
    pub struct FakeCard {
        pub desc: Option<String>,
        pub unreadable: bool,
        pub capture_fails: bool,
    }

    impl FakeCard {
        pub fn new(desc: &str) -> Self {
            Self {
                desc: Some(desc.to_string()),
                ..Self::default()
            }
        }
    }

    /// A scripted listing: each successful swipe moves to the next screen,
    /// and the last screen repeats once the list is exhausted.
    #[derive(Debug, Default)]
    pub struct FakeListing {
        pub screens: Vec<Vec<FakeCard>>,
        pub position: usize,
        pub swipe_fails: bool,
        pub fallback_fails: bool,
        pub query_fails: bool,
        pub captured: Vec<PathBuf>,
        pub swipes: u32,
        pub fallbacks: u32,
    }

    impl FakeListing {
        pub fn new(screens: Vec<Vec<FakeCard>>) -> Self {
            Self {
                screens,
                ..Self::default()
            }
        }

        pub fn from_descs(screens: &[&[&str]]) -> Self {
            Self::new(
                screens
                    .iter()
                    .map(|s| s.iter().map(|d| FakeCard::new(d)).collect())
                    .collect(),
            )
        }

        fn advance(&mut self) {
            if self.position + 1 < self.screens.len() {
                self.position += 1;
            }
        }
    }

    impl ListingSource for FakeListing {
        type Element = FakeCard;

        async fn visible_elements(&mut self) -> Result<Vec<FakeCard>, ElementError> {
            if self.query_fails {
                return Err(ElementError::Query("session lost".to_string()));
            }
            Ok(self.screens.get(self.position).cloned().unwrap_or_default())
        }

        async fn description(&mut self, element: &FakeCard) -> Result<Option<String>, ElementError> {
            if element.unreadable {
                return Err(ElementError::Extraction("stale element".to_string()));
            }
            Ok(element.desc.clone())
        }

        async fn capture(&mut self, element: &FakeCard, path: &Path) -> Result<(), ElementError> {
            if element.capture_fails {
                return Err(ElementError::Capture {
                    path: path.to_path_buf(),
                    reason: "element off screen".to_string(),
                });
            }
            self.captured.push(path.to_path_buf());
            Ok(())
        }

        async fn swipe_up(&mut self) -> Result<(), ElementError> {
            self.swipes += 1;
            if self.swipe_fails {
                return Err(ElementError::Gesture("mobile: swipe unsupported".to_string()));
            }
            self.advance();
            Ok(())
        }

        async fn swipe_by_coordinates(&mut self) -> Result<(), ElementError> {
            self.fallbacks += 1;
            if self.fallback_fails {
                return Err(ElementError::Gesture("pointer actions rejected".to_string()));
            }
            self.advance();
            Ok(())
        }
    }

    pub fn options(target_count: usize) -> CollectorOptions {
        CollectorOptions {
            target_count,
            settle: Duration::ZERO,
            ..CollectorOptions::default()
        }
    }

    fn names(report: &CollectReport) -> Vec<&str> {
        report.records.iter().map(|r| r.name.as_str()).collect()
    }

    #[tokio::test]
    async fn collects_across_screens_until_target() {
        let mut source = FakeListing::from_descs(&[
            &["A, 1 kg, MRP is ₹10, Price is ₹9", "B", "C"],
            &["C", "D", "E"],
            &["F", "G"],
        ]);
        let report = Collector::new(options(5)).collect(&mut source).await;

        assert_eq!(names(&report), ["A", "B", "C", "D", "E"]);
        assert_eq!(report.stop_reason, StopReason::TargetReached);
        assert_eq!(report.iterations, 2);
        assert_eq!(report.records[0].mrp, "10");
        assert_eq!(report.records[0].price, "9");
    }

    #[tokio::test]
    async fn overlapping_screens_are_not_double_counted() {
        let mut source = FakeListing::from_descs(&[&["A", "B", "A"], &["B", "A", "C"], &["C"]]);
        let report = Collector::new(options(100)).collect(&mut source).await;

        assert_eq!(names(&report), ["A", "B", "C"]);
        assert_eq!(report.stop_reason, StopReason::Stagnated);
    }

    #[tokio::test]
    async fn stops_after_three_empty_iterations() {
        let mut source = FakeListing::from_descs(&[&["A", "B"], &["C"]]);
        let report = Collector::new(options(10)).collect(&mut source).await;

        assert_eq!(report.records.len(), 3);
        assert_eq!(report.stop_reason, StopReason::Stagnated);
        // Two productive screens, then three repeats of the last one.
        assert_eq!(report.iterations, 5);
    }

    #[tokio::test]
    async fn stagnation_limit_is_configurable() {
        let mut source = FakeListing::from_descs(&[&["A"]]);
        let opts = CollectorOptions {
            stagnation_limit: 1,
            ..options(10)
        };
        let report = Collector::new(opts).collect(&mut source).await;
        assert_eq!(report.iterations, 2);
    }

    #[tokio::test]
    async fn empty_and_missing_descriptions_are_skipped() {
        let mut source = FakeListing::new(vec![vec![
            FakeCard::new(""),
            FakeCard::default(),
            FakeCard::new("Tomato, 500 g"),
        ]]);
        let report = Collector::new(options(10)).collect(&mut source).await;

        assert_eq!(names(&report), ["Tomato"]);
        assert_eq!(report.records[0].weight, "500 g");
    }

    #[tokio::test]
    async fn target_reached_mid_screen_leaves_rest_unseen() {
        let mut source = FakeListing::from_descs(&[&["A", "B", "C", "D"]]);
        let report = Collector::new(options(2)).collect(&mut source).await;

        assert_eq!(names(&report), ["A", "B"]);
        assert_eq!(report.iterations, 1);
        assert_eq!(source.captured.len(), 2);
    }

    #[tokio::test]
    async fn zero_target_does_nothing() {
        let mut source = FakeListing::from_descs(&[&["A"]]);
        let report = Collector::new(options(0)).collect(&mut source).await;

        assert!(report.records.is_empty());
        assert_eq!(report.iterations, 0);
        assert_eq!(source.swipes, 0);
    }

    #[tokio::test]
    async fn capture_failure_still_produces_record() {
        let mut broken = FakeCard::new("B, 2 pcs");
        broken.capture_fails = true;
        let mut source =
            FakeListing::new(vec![vec![FakeCard::new("A"), broken, FakeCard::new("C")]]);
        let report = Collector::new(options(3)).collect(&mut source).await;

        assert_eq!(names(&report), ["A", "B", "C"]);
        assert_eq!(report.records[1].image_path, "product_images/2_B.png");
        assert_eq!(
            source.captured,
            [
                PathBuf::from("product_images/1_A.png"),
                PathBuf::from("product_images/3_C.png"),
            ]
        );
    }

    #[tokio::test]
    async fn unreadable_element_is_not_marked_seen() {
        let mut stale = FakeCard::new("A");
        stale.unreadable = true;
        let mut source = FakeListing::new(vec![vec![stale], vec![FakeCard::new("A")]]);
        let report = Collector::new(options(10)).collect(&mut source).await;

        assert_eq!(names(&report), ["A"]);
        // First iteration found nothing, second found A, then three empty.
        assert_eq!(report.iterations, 5);
    }

    #[tokio::test]
    async fn unparseable_description_still_yields_record() {
        let mut source = FakeListing::from_descs(&[&["???"]]);
        let report = Collector::new(options(10)).collect(&mut source).await;

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].name, "???");
        assert_eq!(report.records[0].image_path, "product_images/1____.png");
    }

    #[tokio::test]
    async fn falls_back_to_coordinate_swipe() {
        let mut source = FakeListing::from_descs(&[&["A"], &["B"]]);
        source.swipe_fails = true;
        let report = Collector::new(options(2)).collect(&mut source).await;

        assert_eq!(names(&report), ["A", "B"]);
        assert_eq!(report.fallback_scrolls, 2);
        assert_eq!(source.fallbacks, 2);
    }

    #[tokio::test]
    async fn failed_gestures_still_terminate() {
        let mut source = FakeListing::from_descs(&[&["A"], &["B"]]);
        source.swipe_fails = true;
        source.fallback_fails = true;
        let report = Collector::new(options(10)).collect(&mut source).await;

        assert_eq!(names(&report), ["A"]);
        assert_eq!(report.failed_scrolls, 4);
        assert_eq!(report.stop_reason, StopReason::Stagnated);
    }

    #[tokio::test]
    async fn query_failure_counts_as_empty_iteration() {
        let mut source = FakeListing::from_descs(&[&["A"]]);
        source.query_fails = true;
        let report = Collector::new(options(10)).collect(&mut source).await;

        assert!(report.records.is_empty());
        assert_eq!(report.iterations, 3);
    }

    #[tokio::test]
    async fn unsanitized_names_use_index_only() {
        let mut source = FakeListing::from_descs(&[&["Fresh Apple"]]);
        let opts = CollectorOptions {
            sanitized_names: false,
            images_dir: PathBuf::from("shots"),
            ..options(1)
        };
        let report = Collector::new(opts).collect(&mut source).await;
        assert_eq!(report.records[0].image_path, "shots/1.png");
    }

    #[test]
    fn state_tracks_stagnation() {
        let mut state = CollectorState::new(5);
        assert!(state.mark_seen("A"));
        assert!(!state.mark_seen("A"));
        state.end_iteration(0);
        state.end_iteration(0);
        assert_eq!(state.stagnation(), 2);
        state.end_iteration(1);
        assert_eq!(state.stagnation(), 0);
        assert!(state.should_continue(3));
    }

    proptest! {
        #[test]
        fn never_exceeds_target_and_never_duplicates(
            screens in prop::collection::vec(prop::collection::vec(0u8..12, 0..6), 1..8),
            target in 0usize..15,
        ) {
            let screens: Vec<Vec<FakeCard>> = screens
                .iter()
                .map(|s| s.iter().map(|n| FakeCard::new(&format!("Item {n}"))).collect())
                .collect();
            let mut source = FakeListing::new(screens);
            let rt = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
            let report = rt.block_on(Collector::new(options(target)).collect(&mut source));

            prop_assert!(report.records.len() <= target);
            let unique: HashSet<&str> = report.records.iter().map(|r| r.name.as_str()).collect();
            prop_assert_eq!(unique.len(), report.records.len());
            if report.stop_reason == StopReason::Stagnated {
                prop_assert!(report.records.len() < target);
            }
        }
    }
}
