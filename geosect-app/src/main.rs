use std::path::PathBuf;

use geosect_config::{AppConfig, BufferCapKind, ConfigError, ContainmentKind, GridKind};
use geosect_engine::containment::{BufferCap, RayCasting, WindingNumber};
use geosect_engine::errors::EngineError;
use geosect_engine::pipeline::Pipeline;
use geosect_engine::selector::SpatialSelector;
use geosect_engine::transform::{
    CachedTransformer, CoordinateTransformer, GridDefinition, GridTransformer, OperatingRegion,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod demo;
mod errors;
mod loader;
mod report;

use errors::AppError;

type BoxedTransformer = Box<dyn CoordinateTransformer>;

#[derive(Debug, Default)]
struct CliArgs {
    config: Option<PathBuf>,
    records: Option<PathBuf>,
    shape: Option<PathBuf>,
    section: Option<PathBuf>,
    log: Option<String>,
}

fn main() {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    let config = load_configuration(args.config.clone());
    init_logging(&config);
    info!("启动 geosect 剖面工具");

    if let Err(err) = run(&args, &config) {
        error!(error = %err, "执行失败");
        std::process::exit(1);
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<CliArgs, AppError> {
    let mut parsed = CliArgs::default();
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .ok_or_else(|| AppError::Usage(format!("`{flag}` 需要提供参数值")))
        };
        match arg.as_str() {
            "--config" => parsed.config = Some(PathBuf::from(value("--config")?)),
            "--records" => parsed.records = Some(PathBuf::from(value("--records")?)),
            "--shape" => parsed.shape = Some(PathBuf::from(value("--shape")?)),
            "--section" => parsed.section = Some(PathBuf::from(value("--section")?)),
            "--log" => parsed.log = Some(value("--log")?),
            other => return Err(AppError::Usage(format!("未知参数：{other}"))),
        }
    }
    Ok(parsed)
}

fn run(args: &CliArgs, config: &AppConfig) -> Result<(), AppError> {
    let pipeline = build_pipeline(config)?;
    let loaded = loader::load_records_or_demo(args.records.as_deref());
    report::print_source(&loaded);

    let default_buffer = config.selection.default_buffer_m;
    let selection_shape =
        loader::load_shape_or(args.shape.as_deref(), default_buffer, demo::demo_selection)?;
    let (selection, diagnostics) = pipeline.locate_and_select(&loaded.boreholes, &selection_shape);
    report::print_selection(&selection);

    let section_shape = match (&args.section, loaded.is_demo()) {
        (Some(path), _) => Some(geosect_io::load_shape(path, default_buffer)?),
        (None, true) => Some(demo::demo_section()),
        (None, false) => None,
    };
    if let Some(section_shape) = section_shape {
        match pipeline.cross_section(&loaded.boreholes, &selection.selected, &section_shape) {
            Ok(section) => report::print_section(&section),
            Err(err) => warn!(error = %err, "无法生成剖面"),
        }
    }

    let log_id = args
        .log
        .clone()
        .or_else(|| selection.selected.first().map(|point| point.id.to_string()));
    if let Some(id) = log_id {
        match pipeline.log(&loaded.boreholes, &id) {
            Ok(log) => report::print_log(&log),
            Err(err) => warn!(id = %id, error = %err, "无法生成柱状图"),
        }
    }

    report::print_diagnostics(&diagnostics);
    if diagnostics.has_problems() {
        warn!(count = diagnostics.len(), "部分输入未能处理，详见诊断汇总");
    }
    Ok(())
}

fn build_pipeline(config: &AppConfig) -> Result<Pipeline<BoxedTransformer>, EngineError> {
    let region = OperatingRegion::new(
        config.region.min_latitude,
        config.region.max_latitude,
        config.region.min_longitude,
        config.region.max_longitude,
    )?;
    let definition = match config.transform.grid {
        GridKind::BritishNationalGrid => GridDefinition::british_national_grid(),
        GridKind::IrishGrid => GridDefinition::irish_grid(),
    };
    let grid = GridTransformer::new(definition, region);
    info!(grid = grid.definition().name, region = ?grid.region(), "坐标转换已配置");
    let transformer: BoxedTransformer = if config.transform.cache {
        Box::new(CachedTransformer::with_capacity_limit(
            grid,
            config.transform.cache_capacity,
        ))
    } else {
        Box::new(grid)
    };

    let cap = match config.selection.buffer_cap {
        BufferCapKind::Flat => BufferCap::Flat,
        BufferCapKind::Round => BufferCap::Round,
    };
    let selector = match config.selection.containment {
        ContainmentKind::Winding => SpatialSelector::new().with_rule(WindingNumber),
        ContainmentKind::RayCasting => SpatialSelector::new().with_rule(RayCasting),
    }
    .with_buffer_cap(cap);

    let pipeline = Pipeline::new(transformer, selector, config.log.page_depth_m)?;
    info!(
        cache = config.transform.cache,
        cache_capacity = config.transform.cache_capacity,
        rule = pipeline.selector().rule_name(),
        cap = ?pipeline.selector().buffer_cap(),
        page_depth = pipeline.page_depth_span(),
        "处理管线已配置"
    );
    Ok(pipeline)
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } | ConfigError::Invalid(_) => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
