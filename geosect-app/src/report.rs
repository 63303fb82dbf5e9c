use geosect_engine::diagnostics::DiagnosticReport;
use geosect_engine::pipeline::{BoreholeLog, CrossSection};
use geosect_engine::selector::SelectionOutcome;

use crate::loader::{LoadedRecords, RecordSource};

pub fn print_source(loaded: &LoadedRecords) {
    match &loaded.source {
        RecordSource::Json(path) => println!("已从 JSON 加载钻孔记录：{}", path.display()),
        RecordSource::Demo => println!("未指定记录文件，使用内置示例钻孔。"),
    }
    println!("  - 有效记录 {} 条", loaded.boreholes.len());
    if !loaded.rejected.is_empty() {
        println!("  - 拒绝记录 {} 条：", loaded.rejected.len());
        for rejection in &loaded.rejected {
            println!(
                "    · 第 {} 条 ({}): {}",
                rejection.position + 1,
                rejection.id.as_deref().unwrap_or("无编号"),
                rejection.fault
            );
        }
    }
}

pub fn print_selection(selection: &SelectionOutcome) {
    if selection.is_empty() {
        println!("选区内没有钻孔。");
        return;
    }
    println!("选区包含 {} 个钻孔：", selection.len());
    for point in &selection.selected {
        println!(
            "  - {} E={:.1} N={:.1} 纬度={:.6} 经度={:.6}",
            point.id,
            point.easting(),
            point.northing(),
            point.geo.latitude,
            point.geo.longitude
        );
    }
}

pub fn print_section(section: &CrossSection) {
    println!("剖面线长度 {:.1} m，按里程排列：", section.line_length);
    for (projection, borehole) in section.entries() {
        let depth = borehole
            .total_depth()
            .map(|depth| format!("{depth:.2} m"))
            .unwrap_or_else(|| "无地层记录".to_string());
        println!(
            "  - {} 里程={:.2} 偏移={:+.2} 线段={} 终孔深度={}",
            projection.id,
            projection.chainage,
            projection.offset,
            projection.segment + 1,
            depth
        );
    }
}

pub fn print_log(log: &BoreholeLog) {
    println!("钻孔 {} 柱状图，共 {} 页：", log.id, log.pages.len());
    for page in &log.pages {
        println!(
            "  第 {}/{} 页：{:.2} m ~ {:.2} m（{:.2} m）",
            page.number,
            page.total,
            page.window_top,
            page.window_base,
            page.span()
        );
        for fragment in &page.fragments {
            let mut marks = String::new();
            if fragment.continues_above {
                marks.push_str(" ↑续");
            }
            if fragment.continues_below {
                marks.push_str(" ↓续");
            }
            println!(
                "    · 区间 #{} {:.2} ~ {:.2} m{}",
                fragment.interval_index + 1,
                fragment.top,
                fragment.base,
                marks
            );
        }
    }
}

pub fn print_diagnostics(diagnostics: &DiagnosticReport) {
    if diagnostics.is_empty() {
        return;
    }
    println!("诊断汇总：");
    for line in diagnostics.summary() {
        println!("  - {line}");
    }
}
