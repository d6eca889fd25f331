use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::{web, Error, HttpResponse};
use futures::{StreamExt, TryStreamExt};
use log::{error, info};
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use shared::{EyeSide, Gender, PatientInfo, ScreeningResponse};
use std::io::Write;
use std::str::FromStr;
use uuid::Uuid;

use crate::inference::{EnsemblePipeline, PipelineError};
use crate::reports::{assembler, ReportFilter, ReportRecord, ReportStore};

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, static_dir: String) {
    cfg.service(web::resource("/api/screenings").route(web::post().to(handle_screening)))
        .service(web::resource("/api/reports").route(web::get().to(list_reports)))
        .service(Files::new("/static", static_dir).show_files_listing());
}

/// Patient metadata and decision threshold extracted from the multipart text
/// fields. Absent fields fall back to defaults; present but unparsable
/// fields reject the request.
struct ScreeningForm {
    patient: PatientInfo,
    threshold: f32,
}

impl ScreeningForm {
    fn from_fields(fields: &[(String, String)], default_threshold: f32) -> Result<Self, String> {
        let mut patient = PatientInfo {
            name: String::new(),
            age: 30,
            gender: Gender::Other,
            eye_side: EyeSide::Left,
        };
        let mut threshold = default_threshold;

        for (name, value) in fields {
            let value = value.trim();
            match name.as_str() {
                "patient_name" => patient.name = value.to_string(),
                "age" => {
                    let age: u32 = value
                        .parse()
                        .map_err(|_| format!("invalid age: {value}"))?;
                    if !(1..=120).contains(&age) {
                        return Err(format!("age out of range: {age}"));
                    }
                    patient.age = age;
                }
                "gender" => {
                    patient.gender = Gender::from_str(value)
                        .map_err(|_| format!("invalid gender: {value}"))?;
                }
                "eye_side" => {
                    patient.eye_side = EyeSide::from_str(value)
                        .map_err(|_| format!("invalid eye side: {value}"))?;
                }
                "threshold" => {
                    let parsed: f32 = value
                        .parse()
                        .map_err(|_| format!("invalid threshold: {value}"))?;
                    if !(0.0..=1.0).contains(&parsed) {
                        return Err(format!("threshold out of range: {parsed}"));
                    }
                    threshold = parsed;
                }
                _ => {}
            }
        }

        Ok(Self { patient, threshold })
    }
}

async fn handle_screening(
    pipeline: web::Data<EnsemblePipeline>,
    store: web::Data<ReportStore>,
    mut payload: Multipart,
) -> Result<HttpResponse, Error> {
    let mut image_data: Vec<u8> = Vec::new();
    let mut fields: Vec<(String, String)> = Vec::new();

    while let Ok(Some(mut field)) = payload.try_next().await {
        let name = field.name().unwrap_or("").to_string();
        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk?;
            data.write_all(&chunk)?;
        }
        if name == "image" {
            image_data = data;
        } else if !name.is_empty() {
            fields.push((name, String::from_utf8_lossy(&data).into_owned()));
        }
    }

    if image_data.is_empty() {
        return Ok(HttpResponse::BadRequest().json(ErrorResponse {
            error: "missing image upload".into(),
        }));
    }

    let form = match ScreeningForm::from_fields(&fields, pipeline.default_threshold()) {
        Ok(form) => form,
        Err(message) => {
            return Ok(HttpResponse::BadRequest().json(ErrorResponse { error: message }));
        }
    };

    let screening = match pipeline.classify(&image_data, form.threshold) {
        Ok(screening) => screening,
        Err(err @ PipelineError::Decode(_)) => {
            error!("rejected upload: {err}");
            return Ok(HttpResponse::BadRequest().json(ErrorResponse {
                error: err.to_string(),
            }));
        }
        Err(err) => {
            error!("pipeline run failed: {err}");
            return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: err.to_string(),
            }));
        }
    };

    let image_hash = hex::encode(Sha256::digest(&image_data));
    let record = ReportRecord::new(
        &form.patient,
        screening.probability,
        screening.verdict,
        image_hash,
    );
    if let Err(err) = store.append(&record).await {
        error!("failed to persist report: {err}");
        return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
            error: "failed to persist report".into(),
        }));
    }
    let report_text = assembler::render_report(&record);

    let screening_id = Uuid::new_v4();
    info!(
        "screening {screening_id}: {} at p={:.4} (threshold {:.2})",
        screening.verdict, screening.probability, form.threshold
    );

    let response = ScreeningResponse {
        branch_a_scores: screening.branch_a_scores.clone(),
        branch_b_scores: screening.branch_b_scores.clone(),
        class_labels: vec!["Cataract".into(), "Normal".into()],
        probability: screening.probability,
        threshold: form.threshold,
        verdict: screening.verdict,
    };

    Ok(HttpResponse::Ok().json(json!({
        "screening_id": screening_id,
        "image": {
            "width": screening.image_width,
            "height": screening.image_height,
        },
        "screening": response,
        "record": record,
        "report_text": report_text,
    })))
}

async fn list_reports(
    store: web::Data<ReportStore>,
    filter: web::Query<ReportFilter>,
) -> HttpResponse {
    match store.load(&filter).await {
        Ok(records) => HttpResponse::Ok().json(json!({ "reports": records })),
        Err(err) => {
            error!("failed to load reports: {err}");
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "failed to load reports".into(),
            })
        }
    }
}
