use std::fs;
use std::path::{Path, PathBuf};

use moonpies_figures::FigureError;
use moonpies_figures::figures::{
    FigureTarget, MIN_LAYER, comet_sensitivity, compare_runs, kde_layers, surface_boxplot,
    surface_threshold,
};
use moonpies_figures::runs::{
    AggregateLoader, ColumnKey, LayersTable, ResultsSelector, RunRename, locate_results,
};

const RUNS: [&str; 4] = ["moonpies", "no_bsed", "comet_100pct", "other"];
const COLDTRAPS: [&str; 2] = ["Haworth", "Faustini"];
const N_SEEDS: u64 = 5;

fn unique_path(name: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!(
        "moonpies_aggregate_loader_{}_{}",
        name,
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    path
}

/// Total ice for (run, seed, coldtrap); below 1 m for seed 0.
fn total_ice(run: usize, seed: u64, coldtrap: usize) -> f64 {
    if seed == 0 {
        0.5
    } else {
        (run + 1) as f64 * seed as f64 * (coldtrap + 1) as f64
    }
}

fn write_results(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    let mut layers = String::from("run,seed,coldtrap,depth,ice\n");
    let mut runs = String::from("run,seed,coldtrap,total ice,total ice/6m,total ice/100m\n");
    for (r, run) in RUNS.iter().enumerate() {
        for seed in 0..N_SEEDS {
            for (c, coldtrap) in COLDTRAPS.iter().enumerate() {
                for layer in 0..2 {
                    layers.push_str(&format!(
                        "{run},{seed},{coldtrap},{},{}\n",
                        (layer + 1) * 10,
                        0.1 * (layer + 1) as f64
                    ));
                }
                let total = total_ice(r, seed, c);
                runs.push_str(&format!(
                    "{run},{seed},{coldtrap},{total},{},{}\n",
                    0.25 * seed as f64,
                    2.0 * seed as f64
                ));
            }
        }
    }
    fs::write(dir.join("layers.csv"), layers).unwrap();
    fs::write(dir.join("runs.csv"), runs).unwrap();
}

fn coldtraps() -> Vec<String> {
    COLDTRAPS.iter().map(|s| s.to_string()).collect()
}

#[test]
fn loads_latest_dated_directory() {
    let root = unique_path("latest");
    write_results(&root.join("230101"));
    write_results(&root.join("230615"));
    write_results(&root.join("scratch"));
    // Newer but unmarked.
    fs::create_dir_all(root.join("240101")).unwrap();

    let dir = locate_results(&root, &ResultsSelector::Latest).unwrap();
    assert_eq!(dir.file_name().unwrap(), "230615");

    write_results(&root.join("2023-12-31_final"));
    let dir = locate_results(&root, &ResultsSelector::Latest).unwrap();
    assert_eq!(dir.file_name().unwrap(), "2023-12-31_final");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn end_to_end_load_counts_seeds_and_exposes_layer_columns() {
    let root = unique_path("e2e");
    write_results(&root.join("230615"));

    let loaded = AggregateLoader::new(&root).load().unwrap();
    assert_eq!(loaded.run_count, Some(N_SEEDS as usize));
    assert!(!loaded.layers.is_empty());
    assert_eq!(loaded.layers.columns(), &LayersTable::COLUMNS);
    let mut cols = loaded.layers.columns().to_vec();
    cols.sort();
    assert_eq!(cols, vec!["coldtrap", "depth", "ice", "run"]);
    assert_eq!(
        loaded.layers.len(),
        RUNS.len() * N_SEEDS as usize * COLDTRAPS.len() * 2
    );
    assert!(loaded.runs.metric_index("total ice 6m").is_some());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn rename_keeps_mapped_runs_only() {
    let root = unique_path("rename");
    write_results(&root.join("230615"));

    let loaded = AggregateLoader::new(&root)
        .rename(RunRename::new([("moonpies", "Yes"), ("no_bsed", "No")]))
        .load()
        .unwrap();
    assert!(loaded.layers.records.iter().all(|r| r.run == "Yes" || r.run == "No"));
    assert!(loaded.runs.records.iter().all(|r| r.run == "Yes" || r.run == "No"));
    let report = loaded.rename_report.clone().unwrap();
    assert!(report.unmapped_runs.contains("other"));
    assert!(report.unmapped_runs.contains("comet_100pct"));
    assert_eq!(report.unmapped_runs.len(), 2);
    // Two layers plus one runs row per (seed, coldtrap) of each dropped run.
    let per_run_rows = N_SEEDS as usize * COLDTRAPS.len();
    assert_eq!(report.dropped, 2 * (per_run_rows * 2 + per_run_rows));
    assert_eq!(loaded.run_count, Some(N_SEEDS as usize));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn unflattened_metrics_keep_their_levels() {
    let root = unique_path("levels");
    write_results(&root.join("run1"));

    let loaded = AggregateLoader::new(&root)
        .select(ResultsSelector::Named("run1".to_string()))
        .flatten(false)
        .run_count(false)
        .load()
        .unwrap();
    assert_eq!(loaded.run_count, None);
    assert!(loaded.runs.metrics.contains(&ColumnKey(vec![
        "total ice".to_string(),
        "6m".to_string()
    ])));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn missing_results_are_not_found() {
    let root = unique_path("missing");
    assert!(matches!(
        AggregateLoader::new(&root).load(),
        Err(FigureError::NotFound { .. })
    ));
    fs::create_dir_all(root.join("empty")).unwrap();
    assert!(matches!(
        locate_results(&root, &ResultsSelector::Latest),
        Err(FigureError::NotFound { .. })
    ));
    assert!(matches!(
        locate_results(&root, &ResultsSelector::Named("empty".to_string())),
        Err(FigureError::NotFound { .. })
    ));
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn layers_without_required_column_fail() {
    let root = unique_path("badcols");
    let dir = root.join("230615");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("layers.csv"), "run,seed,coldtrap,depth\nmoonpies,0,Haworth,1\n").unwrap();
    assert!(matches!(
        AggregateLoader::new(&root).load(),
        Err(FigureError::MissingColumn(c)) if c == "ice"
    ));
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn compare_runs_masks_thin_ice_and_reports_run_count() {
    let root = unique_path("compare");
    write_results(&root.join("230615"));
    let loaded = AggregateLoader::new(&root).load().unwrap();

    let figure = compare_runs(
        &loaded,
        &coldtraps(),
        &["moonpies", "no_bsed"],
        &["Yes", "No"],
        "Ballistic Sedimentation",
        &FigureTarget::unsaved(),
    )
    .unwrap();
    assert_eq!(figure.run_count, N_SEEDS as usize);
    assert!(figure.title.ends_with("(5 runs)"));
    assert_eq!(figure.runs, vec!["No".to_string(), "Yes".to_string()]);
    assert_eq!(figure.groups.len(), COLDTRAPS.len() * 2);
    for group in &figure.groups {
        // Seed 0 is below 1 m and masked.
        assert_eq!(group.stats.count, N_SEEDS as usize - 1);
        assert!(group.stats.q1 <= group.stats.median && group.stats.median <= group.stats.q3);
    }
    // The input is left untouched.
    assert!(loaded.runs.records.iter().any(|r| r.run == "other"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn surface_boxplot_uses_nominal_run_and_depth_thresholds() {
    let root = unique_path("surface");
    write_results(&root.join("230615"));
    let loaded = AggregateLoader::new(&root).load().unwrap();

    let figure =
        surface_boxplot(&loaded, &coldtraps(), &[6.0, 100.0], &FigureTarget::unsaved()).unwrap();
    assert_eq!(figure.run_count, N_SEEDS as usize);
    assert_eq!(figure.panels.len(), 2);
    assert_eq!(figure.panels[0].key, "total ice 6m");
    assert_eq!(figure.panels[0].threshold, surface_threshold(6.0));
    assert_eq!(figure.panels[1].threshold, 5.0);
    // 6 m values are 0.25 * seed: seeds 2, 3 and 4 exceed 0.3 m.
    let (_, frac) = &figure.panels[0].exceedance[0];
    assert!((frac - 0.6).abs() < 1e-12);
    // 100 m values are 2 * seed: seeds 3 and 4 exceed 5 m.
    let (_, frac) = &figure.panels[1].exceedance[1];
    assert!((frac - 0.4).abs() < 1e-12);
    for (_, b) in &figure.panels[1].boxes {
        assert_eq!(b.count, N_SEEDS as usize);
    }

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn comet_sensitivity_compares_nominal_and_full_hydration() {
    let root = unique_path("comet");
    write_results(&root.join("230615"));
    let loaded = AggregateLoader::new(&root).load().unwrap();

    let figure = comet_sensitivity(&loaded, &coldtraps(), &FigureTarget::unsaved()).unwrap();
    assert!(figure.title.starts_with("Comet Hydration [wt%]"));
    assert!(figure.title.ends_with("(5 runs)"));
    assert_eq!(figure.runs, vec!["100%".to_string(), "20%".to_string()]);
    // comet_100pct delivers three times the nominal ice at every seed.
    let median = |run: &str| {
        figure
            .groups
            .iter()
            .find(|g| g.coldtrap == "Haworth" && g.run == run)
            .unwrap()
            .stats
            .median
    };
    assert!((median("100%") - median("20%") - 3f64.log10()).abs() < 1e-9);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn kde_layers_rounds_masks_and_floors_layer_tops() {
    let root = unique_path("kde");
    let dir = root.join("230615");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("layers.csv"),
        "run,seed,coldtrap,depth,ice\n\
         moonpies,0,Haworth,10.0,2.0\n\
         moonpies,1,Haworth,5.0,0.04\n\
         moonpies,2,Haworth,0.5,1.0\n\
         moonpies,3,Haworth,0.04,0.5\n\
         moonpies,4,Haworth,20.0,0.06\n\
         no_bsed,0,Haworth,30.0,4.0\n\
         other,0,Haworth,1.0,1.0\n\
         moonpies,0,Faustini,3.0,1.0\n",
    )
    .unwrap();
    let loaded = AggregateLoader::new(&root).load().unwrap();

    let figure = kde_layers(
        &loaded,
        &coldtraps(),
        &["moonpies", "no_bsed"],
        &["Yes", "No"],
        &FigureTarget::unsaved(),
    )
    .unwrap();
    assert_eq!(figure.runs, vec!["Yes".to_string(), "No".to_string()]);
    assert_eq!(figure.groups.len(), COLDTRAPS.len() * 2);

    let yes = figure.group("Haworth", "Yes").unwrap();
    // 0.04 m of ice and 0.04 m depth round to zero and are dropped.
    assert_eq!(yes.ice, vec![2.0, 1.0, 0.1]);
    assert_eq!(yes.depth, vec![10.0, 0.5, 20.0]);
    assert_eq!(yes.depth_top[1], MIN_LAYER);
    assert!((yes.depth_top[2] - 19.9).abs() < 1e-9);
    assert_eq!(yes.ice_stats.count, 3);
    assert_eq!(yes.ice_stats.median, 1.0);
    assert_eq!(yes.depth_top_stats.median, 8.0);
    assert_eq!(yes.ice_hist.total(), 3);
    assert_eq!(yes.depth_top_hist.total(), 3);

    let no = figure.group("Haworth", "No").unwrap();
    assert_eq!(no.depth_top, vec![26.0]);
    assert_eq!(figure.group("Faustini", "No").unwrap().ice_stats.count, 0);
    assert!(figure.groups.iter().all(|g| g.run != "other"));
    // The loaded table keeps its original run ids.
    assert!(loaded.layers.records.iter().any(|r| r.run == "other"));

    let _ = fs::remove_dir_all(&root);
}
