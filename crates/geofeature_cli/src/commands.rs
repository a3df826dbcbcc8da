use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use geofeature_core::db::open_db;
use geofeature_core::{parse_feature_collection, FeatureCollectionInput, FeatureService, WktCodec};
use log::info;
use serde::Serialize;

use crate::cli::{InputArgs, ProjectArgs};

fn read_collection(input: &str) -> Result<FeatureCollectionInput> {
    let content = if input == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read from stdin")?;
        buf
    } else {
        fs::read_to_string(input).with_context(|| format!("Failed to read file: {input}"))?
    };
    parse_feature_collection(&content).context("Invalid FeatureCollection JSON")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn update(db: &Path, args: &InputArgs) -> Result<()> {
    let collection = read_collection(&args.input)?;
    let mut conn = open_db(db).with_context(|| format!("Failed to open {}", db.display()))?;
    let mut service = FeatureService::try_new(&mut conn, WktCodec)?;

    let report = service.update_project_features(args.project, Some(&collection))?;
    info!("event=cli_update status=ok run_id={}", report.run_id);
    eprintln!("{}", report.summary());
    print_json(&report)
}

pub fn plan(db: &Path, args: &InputArgs) -> Result<()> {
    let collection = read_collection(&args.input)?;
    let mut conn = open_db(db).with_context(|| format!("Failed to open {}", db.display()))?;
    let service = FeatureService::try_new(&mut conn, WktCodec)?;

    let report = service.preview_project_features(args.project, Some(&collection))?;
    print_json(&report)
}

pub fn features(db: &Path, args: &ProjectArgs) -> Result<()> {
    let mut conn = open_db(db).with_context(|| format!("Failed to open {}", db.display()))?;
    let service = FeatureService::try_new(&mut conn, WktCodec)?;

    let collection = service.get_project_features(args.project)?;
    print_json(&collection)
}
