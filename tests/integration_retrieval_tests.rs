use std::path::PathBuf;

use vanban::retrieval::{format_block, parse_labels, rank, vote_labels, Corpus, RankingOptions};

fn write_corpus(rows: &[&str]) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("Should create temp dir");
    let path = dir.path().join("corpus.csv");
    let mut content = String::from("doc_type,issuer,title,content,labels\n");
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    std::fs::write(&path, content).expect("Should write corpus file");
    (dir, path)
}

fn sample_rows() -> Vec<&'static str> {
    vec![
        "Quyết định,UBND tỉnh,Quyết định điều động nhân sự,Quyết định về việc điều động nhân sự giữa các phòng ban thuộc sở,Phòng Tổ chức; Phòng Nhân sự",
        "Công văn,Sở Tài chính,Hướng dẫn quyết toán,Hướng dẫn quyết toán kinh phí hoạt động thường xuyên của đơn vị,Phòng Kế toán",
        "Kế hoạch,Sở Nội vụ,Kế hoạch đào tạo,Kế hoạch đào tạo bồi dưỡng cán bộ công chức viên chức hàng năm,\"Trình lãnh đạo, chờ phê duyệt; Lưu VT\"",
        "Thông báo,Văn phòng UBND,Thông báo lịch họp,Thông báo lịch họp giao ban định kỳ hàng tháng của ủy ban,Theo dõi",
    ]
}

#[test]
fn test_personnel_document_retrieves_personnel_neighbors() {
    let (_dir, path) = write_corpus(&sample_rows());
    let corpus = Corpus::load(&path, 10).expect("Corpus should load");
    assert_eq!(corpus.len(), 4);

    let ranked = rank(
        &corpus.records,
        "quyết định nhân sự phòng ban điều động cán bộ",
        &RankingOptions::default(),
    );
    assert!(!ranked.is_empty());
    assert_eq!(ranked[0].record.title, "Quyết định điều động nhân sự");

    // Labels come back verbatim: split on semicolons only
    assert_eq!(
        ranked[0].record.labels,
        vec!["Phòng Tổ chức", "Phòng Nhân sự"]
    );
}

#[test]
fn test_label_with_comma_survives_load_and_voting() {
    let (_dir, path) = write_corpus(&sample_rows());
    let corpus = Corpus::load(&path, 10).expect("Corpus should load");

    let ranked = rank(
        &corpus.records,
        "kế hoạch đào tạo bồi dưỡng cán bộ công chức",
        &RankingOptions::default(),
    );
    assert_eq!(ranked[0].record.title, "Kế hoạch đào tạo");

    let votes = vote_labels(&ranked, None, 0.0);
    let labels: Vec<&str> = votes.iter().map(|v| v.label.as_str()).collect();
    // The comma stays inside the label; only the semicolon splits
    assert!(labels.contains(&"Trình lãnh đạo, chờ phê duyệt"));
    assert!(labels.contains(&"Lưu VT"));
    assert!(!labels.contains(&"Trình lãnh đạo"));
}

#[test]
fn test_result_count_is_monotone_in_k() {
    let (_dir, path) = write_corpus(&sample_rows());
    let corpus = Corpus::load(&path, 10).expect("Corpus should load");
    let query = "quyết định kế hoạch cán bộ công chức phòng ban";

    let mut previous_len = 0usize;
    let mut previous_first: Option<String> = None;
    for k in 1..=4 {
        let ranked = rank(
            &corpus.records,
            query,
            &RankingOptions {
                top_k: k,
                ..RankingOptions::default()
            },
        );
        assert!(ranked.len() >= previous_len, "k={} shrank the result set", k);
        if let Some(first) = ranked.first() {
            if let Some(previous) = &previous_first {
                assert_eq!(&first.record.title, previous);
            }
            previous_first = Some(first.record.title.clone());
        }
        previous_len = ranked.len();
    }
}

#[test]
fn test_formatted_block_structure() {
    let (_dir, path) = write_corpus(&sample_rows());
    let corpus = Corpus::load(&path, 10).expect("Corpus should load");
    let ranked = rank(
        &corpus.records,
        "quyết định điều động nhân sự phòng ban",
        &RankingOptions::default(),
    );
    let block = format_block(&ranked, 80);

    assert!(block.starts_with("Tài liệu tham khảo tương tự:"));
    assert!(block.contains("[1] Quyết định điều động nhân sự — UBND tỉnh"));
    assert!(block.contains("Hành động: Phòng Tổ chức; Phòng Nhân sự"));
}

#[test]
fn test_unrelated_query_returns_nothing() {
    let (_dir, path) = write_corpus(&sample_rows());
    let corpus = Corpus::load(&path, 10).expect("Corpus should load");
    let ranked = rank(
        &corpus.records,
        "completely unrelated foreign words zzz",
        &RankingOptions::default(),
    );
    assert!(ranked.is_empty());
}

#[test]
fn test_label_parse_round_trip_on_loaded_records() {
    let (_dir, path) = write_corpus(&sample_rows());
    let corpus = Corpus::load(&path, 10).expect("Corpus should load");
    for record in &corpus.records {
        // Re-parsing the raw string reproduces the stored labels exactly
        assert_eq!(parse_labels(&record.raw_labels), record.labels);
    }
}
