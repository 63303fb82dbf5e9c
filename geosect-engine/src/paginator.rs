use geosect_core::borehole::DepthInterval;
use geosect_core::section::{Page, PageFragment};
use tracing::debug;

use crate::errors::EngineError;

/// 页数计算时容许的相对误差，避免 20.0 / 10.0 之类的整除因浮点误差多出一页。
const PAGE_COUNT_SLACK: f64 = 1e-9;

/// 单个钻孔允许生成的最大页数。
pub const MAX_PAGES: usize = 10_000;

/// 校验区间序列：非空、数值有限、厚度非负、按深度排序且互不重叠。
pub fn validate_intervals(intervals: &[DepthInterval]) -> Result<(), EngineError> {
    if intervals.is_empty() {
        return Err(EngineError::MalformedIntervals {
            index: 0,
            reason: "borehole has no intervals".to_string(),
        });
    }
    for (index, interval) in intervals.iter().enumerate() {
        if !interval.top.is_finite() || !interval.base.is_finite() {
            return Err(EngineError::MalformedIntervals {
                index,
                reason: "depth is not finite".to_string(),
            });
        }
        if interval.base < interval.top {
            return Err(EngineError::MalformedIntervals {
                index,
                reason: format!(
                    "negative thickness (top {}, base {})",
                    interval.top, interval.base
                ),
            });
        }
        if index > 0 && interval.top < intervals[index - 1].base {
            return Err(EngineError::MalformedIntervals {
                index,
                reason: format!(
                    "top {} is above the previous base {}",
                    interval.top,
                    intervals[index - 1].base
                ),
            });
        }
    }
    Ok(())
}

/// 将钻孔的完整深度范围切分为固定高度的页面。
///
/// 首页窗口从第一条区间顶深开始，之后每页顶深等于上一页底深，直到覆盖最后一条区间的底深；
/// 末页底深与终孔深度严格相等，不会产生空白尾页。跨页区间拆分为片段，片段保留原区间序号，
/// 各片段厚度之和等于原厚度。
pub fn paginate(intervals: &[DepthInterval], page_depth_span: f64) -> Result<Vec<Page>, EngineError> {
    if !page_depth_span.is_finite() || page_depth_span <= 0.0 {
        return Err(EngineError::InvalidConfiguration(format!(
            "page depth span must be a positive distance, got {page_depth_span}"
        )));
    }
    validate_intervals(intervals)?;

    let start = intervals[0].top;
    let end = intervals[intervals.len() - 1].base;
    let ratio = (end - start) / page_depth_span;
    if !ratio.is_finite() || ratio - PAGE_COUNT_SLACK > MAX_PAGES as f64 {
        return Err(EngineError::InvalidConfiguration(format!(
            "page depth span {page_depth_span} would split {start}..{end} into more than {MAX_PAGES} pages"
        )));
    }
    let total = ((ratio - PAGE_COUNT_SLACK).ceil() as usize).max(1);

    let mut pages = Vec::with_capacity(total);
    for index in 0..total {
        // 按序号直接计算窗口边界，避免逐页累加的误差
        let window_top = start + index as f64 * page_depth_span;
        let is_last = index + 1 == total;
        let window_base = if is_last {
            end
        } else {
            start + (index + 1) as f64 * page_depth_span
        };
        let fragments = intervals
            .iter()
            .enumerate()
            .filter_map(|(interval_index, interval)| {
                clip_to_window(interval_index, interval, window_top, window_base, is_last)
            })
            .collect();
        pages.push(Page {
            number: index + 1,
            total,
            window_top,
            window_base,
            fragments,
        });
    }

    debug!(
        pages = total,
        top = start,
        base = end,
        span = page_depth_span,
        "钻孔分页完成"
    );
    Ok(pages)
}

fn clip_to_window(
    interval_index: usize,
    interval: &DepthInterval,
    window_top: f64,
    window_base: f64,
    is_last: bool,
) -> Option<PageFragment> {
    let thickness = interval.thickness();
    if thickness == 0.0 {
        // 零厚度区间归入包含其深度的那一页；恰在分页线上时归入下一页
        let depth = interval.top;
        let inside = depth >= window_top && (depth < window_base || (is_last && depth <= window_base));
        return inside.then_some(PageFragment {
            interval_index,
            top: depth,
            base: depth,
            continues_above: false,
            continues_below: false,
        });
    }

    let top = interval.top.max(window_top);
    let base = interval.base.min(window_base);
    if base <= top {
        return None;
    }
    Some(PageFragment {
        interval_index,
        top,
        base,
        continues_above: interval.top < window_top,
        continues_below: interval.base > window_base,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intervals(bounds: &[(f64, f64)]) -> Vec<DepthInterval> {
        bounds
            .iter()
            .map(|&(top, base)| DepthInterval::new(top, base))
            .collect()
    }

    #[test]
    fn total_depth_23_4_with_10m_span_gives_three_pages() {
        let log = intervals(&[(0.0, 1.2), (1.2, 9.0), (9.0, 11.0), (11.0, 23.4)]);
        let pages = paginate(&log, 10.0).expect("paginate");
        assert_eq!(pages.len(), 3);
        let bases: Vec<f64> = pages.iter().map(|page| page.window_base).collect();
        assert_eq!(bases, vec![10.0, 20.0, 23.4]);
        assert_eq!(pages[0].window_top, 0.0);
        assert_eq!(pages[1].window_top, 10.0);
        assert_eq!(pages[2].window_top, 20.0);
        assert!(pages.iter().all(|page| page.total == 3));
        assert!(pages[2].is_last());
        // 末页只覆盖到终孔深度
        assert_eq!(pages[0].span(), 10.0);
        assert!((pages[2].span() - 3.4).abs() < 1e-9);

        for (index, interval) in log.iter().enumerate() {
            let sum: f64 = pages
                .iter()
                .flat_map(|page| page.fragments.iter())
                .filter(|fragment| fragment.interval_index == index)
                .map(PageFragment::thickness)
                .sum();
            assert!(
                (sum - interval.thickness()).abs() < 1e-6,
                "interval {index}: {sum} vs {}",
                interval.thickness()
            );
        }
    }

    #[test]
    fn interval_crossing_a_page_boundary_is_split() {
        let log = intervals(&[(0.0, 9.0), (9.0, 11.0), (11.0, 15.0)]);
        let pages = paginate(&log, 10.0).expect("paginate");
        assert_eq!(pages.len(), 2);

        let first = pages[0]
            .fragments
            .iter()
            .find(|fragment| fragment.interval_index == 1)
            .expect("fragment on page 1");
        assert_eq!((first.top, first.base), (9.0, 10.0));
        assert!(!first.continues_above);
        assert!(first.continues_below);

        let second = pages[1]
            .fragments
            .iter()
            .find(|fragment| fragment.interval_index == 1)
            .expect("fragment on page 2");
        assert_eq!((second.top, second.base), (10.0, 11.0));
        assert!(second.continues_above);
        assert!(!second.continues_below);
    }

    #[test]
    fn windows_are_contiguous_and_last_base_is_exact() {
        let log = intervals(&[(1.5, 4.1), (4.1, 7.3), (7.3, 30.0)]);
        let pages = paginate(&log, 3.3).expect("paginate");
        for pair in pages.windows(2) {
            assert_eq!(pair[0].window_base, pair[1].window_top);
        }
        assert_eq!(pages[0].window_top, 1.5);
        assert_eq!(pages.last().map(|page| page.window_base), Some(30.0));
        assert!(pages.iter().all(|page| !page.fragments.is_empty()));
        assert_eq!(pages.len(), 9);
    }

    #[test]
    fn exact_multiple_has_no_trailing_empty_page() {
        let log = intervals(&[(0.0, 20.0)]);
        let pages = paginate(&log, 10.0).expect("paginate");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].window_base, 20.0);
    }

    #[test]
    fn gaps_between_intervals_are_allowed() {
        let log = intervals(&[(0.0, 4.0), (6.0, 12.0)]);
        let pages = paginate(&log, 5.0).expect("paginate");
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].fragments.len(), 1);
        assert_eq!(pages[1].fragments[0].top, 6.0);
        assert!(!pages[1].fragments[0].continues_above);
        assert_eq!(pages[2].window_base, 12.0);
    }

    #[test]
    fn zero_thickness_interval_lands_on_one_page() {
        let log = intervals(&[(0.0, 10.0), (10.0, 10.0), (10.0, 15.0)]);
        let pages = paginate(&log, 10.0).expect("paginate");
        let hits: Vec<usize> = pages
            .iter()
            .filter(|page| page.fragments.iter().any(|f| f.interval_index == 1))
            .map(|page| page.number)
            .collect();
        assert_eq!(hits, vec![2]);
    }

    #[test]
    fn non_positive_span_is_rejected() {
        let log = intervals(&[(0.0, 5.0)]);
        for span in [0.0, -1.0, f64::NAN] {
            let err = paginate(&log, span).unwrap_err();
            assert!(matches!(err, EngineError::InvalidConfiguration(_)));
        }
    }

    #[test]
    fn tiny_span_exceeding_page_limit_is_rejected() {
        let log = intervals(&[(0.0, 10.0)]);
        for span in [1e-300, f64::MIN_POSITIVE, 5e-324] {
            let err = paginate(&log, span).unwrap_err();
            assert!(matches!(err, EngineError::InvalidConfiguration(_)), "{span}");
        }

        // 恰好达到上限仍然允许
        let pages = paginate(&log, 10.0 / MAX_PAGES as f64).expect("页数等于上限");
        assert_eq!(pages.len(), MAX_PAGES);
    }

    #[test]
    fn malformed_intervals_are_rejected() {
        let err = paginate(&[], 10.0).unwrap_err();
        assert!(matches!(err, EngineError::MalformedIntervals { index: 0, .. }));

        let negative = intervals(&[(0.0, 2.0), (5.0, 3.0)]);
        assert!(matches!(
            paginate(&negative, 10.0),
            Err(EngineError::MalformedIntervals { index: 1, .. })
        ));

        let overlapping = intervals(&[(0.0, 5.0), (4.0, 8.0)]);
        assert!(matches!(
            validate_intervals(&overlapping),
            Err(EngineError::MalformedIntervals { index: 1, .. })
        ));
    }
}
