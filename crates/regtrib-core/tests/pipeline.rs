use std::io::{Cursor, Write};

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use pretty_assertions::assert_eq;
use zip::write::SimpleFileOptions;

use regtrib_core::{
    Pipeline, PipelineOutcome, PipelineState, RegtribConfig, RegtribError, XLSX_MIME_TYPE,
};

fn nfe(cnpj: &str, name: &str, crt: Option<&str>) -> String {
    let crt = crt.map(|c| format!("<CRT>{c}</CRT>")).unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe" versao="4.00">
  <NFe>
    <infNFe versao="4.00">
      <emit>
        <CNPJ>{cnpj}</CNPJ>
        <xNome>{name}</xNome>
        <enderEmit><xMun>SAO PAULO</xMun></enderEmit>
        {crt}
      </emit>
    </infNFe>
  </NFe>
</nfeProc>"#
    )
}

fn build_zip(entries: &[(&str, String)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn read_sheet(bytes: &[u8]) -> Vec<Vec<String>> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes.to_vec())).unwrap();
    let range = workbook.worksheet_range("Regime").unwrap();
    range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Data::String(s) => s.clone(),
                    Data::Empty => String::new(),
                    other => other.to_string(),
                })
                .collect()
        })
        .collect()
}

fn pipeline() -> Pipeline {
    let mut config = RegtribConfig::default();
    config.extraction.workers = 4;
    Pipeline::new(config)
}

#[tokio::test]
async fn test_duplicates_and_missing_fields() {
    let archive = build_zip(&[
        ("a.xml", nfe("11222333000181", "ACME LTDA", Some("1"))),
        ("sub/b.xml", nfe("11222333000181", "ACME LTDA", Some("1"))),
        ("sub/deeper/c.xml", nfe("11222333000181", "ACME LTDA", None)),
    ]);

    let outcome = pipeline().run(&archive).await.unwrap();

    let PipelineOutcome::Report(artifact) = outcome else {
        panic!("expected a report");
    };
    assert_eq!(artifact.run.summary.total_read, 2);
    assert_eq!(artifact.run.summary.duplicates_removed, 1);
    assert_eq!(artifact.run.summary.total_final, 1);
    assert_eq!(artifact.run.documents_found, 3);
    assert_eq!(artifact.run.state, PipelineState::Done);
    assert!(artifact.run.diagnostics.is_empty());
    assert_eq!(artifact.file_name, "Regime_Tributario.xlsx");
    assert_eq!(artifact.mime_type, XLSX_MIME_TYPE);

    let rows = read_sheet(&artifact.bytes);
    assert_eq!(
        rows,
        vec![
            vec![
                "Total lidos: 2 | Duplicados removidos: 1 | Total final: 1".to_string(),
                String::new(),
                String::new(),
            ],
            vec![
                "CNPJ".to_string(),
                "Nome da Empresa".to_string(),
                "Regime Tributário".to_string(),
            ],
            vec![
                "11.222.333/0001-81".to_string(),
                "ACME LTDA".to_string(),
                "Simples Nacional".to_string(),
            ],
        ]
    );
}

#[tokio::test]
async fn test_report_rows_match_total_final() {
    let archive = build_zip(&[
        ("1.xml", nfe("11222333000181", "ACME LTDA", Some("1"))),
        ("2.XML", nfe("52998224725", "JOSE DA SILVA", Some("4"))),
        ("3.xml", nfe("12345", "SEM FORMATO", Some("7"))),
        ("4.xml", nfe("11222333000181", "ACME LTDA", Some("3"))),
        ("5.xml", "<nfeProc><unclosed>".to_string()),
        ("readme.txt", "not a document".to_string()),
    ]);

    let outcome = pipeline().run(&archive).await.unwrap();

    let PipelineOutcome::Report(artifact) = outcome else {
        panic!("expected a report");
    };
    let summary = artifact.run.summary;
    assert_eq!(summary.total_read, 4);
    assert_eq!(summary.total_final, 4);
    assert_eq!(summary.total_read, summary.duplicates_removed + summary.total_final);

    let rows = read_sheet(&artifact.bytes);
    assert_eq!(rows.len() - 2, summary.total_final);
    assert_eq!(rows[2], vec!["11.222.333/0001-81", "ACME LTDA", "Simples Nacional"]);
    assert_eq!(rows[3], vec!["529.982.247-25", "JOSE DA SILVA", "Microempreendedor Individual"]);
    assert_eq!(rows[4], vec!["12345", "SEM FORMATO", "Não identificado"]);
    assert_eq!(rows[5], vec!["11.222.333/0001-81", "ACME LTDA", "Regime Normal"]);

    let paths: Vec<String> = artifact
        .run
        .diagnostics
        .iter()
        .map(|d| d.path.display().to_string())
        .collect();
    // 12345 fails check-digit validation; 5.xml is malformed.
    assert_eq!(paths, vec!["3.xml", "5.xml"]);
}

#[tokio::test]
async fn test_report_registers_table() {
    let archive = build_zip(&[("a.xml", nfe("11222333000181", "ACME LTDA", Some("2")))]);

    let PipelineOutcome::Report(artifact) = pipeline().run(&archive).await.unwrap() else {
        panic!("expected a report");
    };

    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(artifact.bytes)).unwrap();
    workbook.load_tables().unwrap();
    let names: Vec<String> = workbook.table_names().into_iter().cloned().collect();
    assert_eq!(names, vec!["RegimeTributario".to_string()]);
}

#[tokio::test]
async fn test_archive_without_documents_is_no_data() {
    let archive = build_zip(&[("notes.txt", "hello".to_string())]);

    let outcome = pipeline().run(&archive).await.unwrap();

    assert!(outcome.is_no_data());
    let run = outcome.run_report();
    assert_eq!(run.documents_found, 0);
    assert_eq!(run.summary.total_final, 0);
    assert_eq!(run.state, PipelineState::Done);
}

#[tokio::test]
async fn test_only_invalid_documents_is_no_data() {
    let archive = build_zip(&[
        ("a.xml", nfe("11222333000181", "ACME LTDA", None)),
        ("b.xml", "<<<".to_string()),
    ]);

    let outcome = pipeline().run(&archive).await.unwrap();

    let PipelineOutcome::NoData(run) = outcome else {
        panic!("expected no data");
    };
    assert_eq!(run.documents_found, 2);
    assert_eq!(run.diagnostics.len(), 1);
}

#[tokio::test]
async fn test_corrupted_archive_fails() {
    let result = pipeline().run(b"PK\x03\x04 this is not really a zip").await;

    assert!(matches!(result, Err(RegtribError::Archive(_))));
}

#[tokio::test]
async fn test_oversized_name_does_not_sink_the_run() {
    let archive = build_zip(&[
        ("good.xml", nfe("11222333000181", "ACME LTDA", Some("1"))),
        ("long.xml", nfe("52998224725", &"A".repeat(40_000), Some("1"))),
    ]);

    let outcome = pipeline().run(&archive).await.unwrap();

    let PipelineOutcome::Report(artifact) = outcome else {
        panic!("expected a report");
    };
    assert_eq!(artifact.run.summary.total_final, 1);
    assert_eq!(artifact.run.diagnostics.len(), 1);
    assert_eq!(artifact.run.diagnostics[0].path.display().to_string(), "long.xml");

    let rows = read_sheet(&artifact.bytes);
    assert_eq!(rows[2], vec!["11.222.333/0001-81", "ACME LTDA", "Simples Nacional"]);
}

fn pipeline_in(scratch: &std::path::Path) -> Pipeline {
    let mut config = RegtribConfig::default();
    config.extraction.workers = 2;
    config.archive.work_dir = Some(scratch.to_path_buf());
    Pipeline::new(config)
}

fn leftover_entries(scratch: &std::path::Path) -> usize {
    std::fs::read_dir(scratch).unwrap().count()
}

#[tokio::test]
async fn test_working_directory_removed_on_every_outcome() {
    let scratch = tempfile::tempdir().unwrap();

    let report = build_zip(&[("a.xml", nfe("11222333000181", "ACME LTDA", Some("1")))]);
    let outcome = pipeline_in(scratch.path()).run(&report).await.unwrap();
    assert!(!outcome.is_no_data());
    assert_eq!(leftover_entries(scratch.path()), 0);

    let no_data = build_zip(&[("a.xml", nfe("11222333000181", "ACME LTDA", None))]);
    let outcome = pipeline_in(scratch.path()).run(&no_data).await.unwrap();
    assert!(outcome.is_no_data());
    assert_eq!(leftover_entries(scratch.path()), 0);

    let mut limited = RegtribConfig::default();
    limited.archive.work_dir = Some(scratch.path().to_path_buf());
    limited.archive.max_total_bytes = 600;
    let too_big = build_zip(&[
        ("a.xml", nfe("11222333000181", "ACME LTDA", Some("1"))),
        ("b.xml", nfe("11222333000181", "ACME LTDA", Some("1"))),
    ]);
    let result = Pipeline::new(limited).run(&too_big).await;
    assert!(matches!(result, Err(RegtribError::Archive(_))));
    assert_eq!(leftover_entries(scratch.path()), 0);
}
