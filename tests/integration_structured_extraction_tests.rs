use std::io::Write;
use std::path::PathBuf;

use rust_xlsxwriter::Workbook;
use vanban::extract::{extract_structured, ExtractLimits};

fn temp_path(name: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("Should create temp dir");
    let path = dir.path().join(name);
    (dir, path)
}

#[test]
fn test_two_sheet_workbook_yields_two_pages() {
    let (_dir, path) = temp_path("danh-sach.xlsx");

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Nhân sự").expect("Should set sheet name");
    sheet.write_string(0, 0, "Họ tên").expect("Should write cell");
    sheet.write_string(0, 1, "Chức vụ").expect("Should write cell");
    sheet.write_string(1, 0, "Nguyễn Văn A").expect("Should write cell");
    sheet.write_string(1, 1, "Trưởng phòng").expect("Should write cell");

    let sheet2 = workbook.add_worksheet();
    sheet2.set_name("Lương").expect("Should set sheet name");
    sheet2.write_string(0, 0, "Hệ số").expect("Should write cell");
    sheet2.write_number(0, 1, 4.98).expect("Should write cell");

    workbook.save(&path).expect("Should save workbook");

    let result = extract_structured(&path, &ExtractLimits::default());
    assert!(result.ok, "extraction failed: {:?}", result.note);
    assert_eq!(result.pages.len(), 2);

    assert!(result.pages[0].starts_with("[Nhân sự]"));
    assert!(result.pages[0].contains("Họ tên | Chức vụ"));
    assert!(result.pages[0].contains("Nguyễn Văn A | Trưởng phòng"));

    assert!(result.pages[1].starts_with("[Lương]"));
    assert!(result.pages[1].contains("Hệ số"));

    // Full text joins the pages
    assert!(result.text.contains("[Nhân sự]"));
    assert!(result.text.contains("[Lương]"));
}

#[test]
fn test_docx_paragraph_extraction() {
    let (_dir, path) = temp_path("quyet-dinh.docx");

    let file = std::fs::File::create(&path).expect("Should create file");
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    zip.start_file("word/document.xml", options)
        .expect("Should start entry");
    zip.write_all(
        br#"<?xml version="1.0"?>
<w:document><w:body>
  <w:p><w:r><w:t>QUY&#7870;T &#272;&#7882;NH</w:t></w:r></w:p>
  <w:p><w:r><w:t>&#272;i&#7873;u 1. B&#7893; nhi&#7879;m &#244;ng Nguy&#7877;n V&#259;n A</w:t></w:r></w:p>
  <w:tbl><w:tr><w:tc><w:p><w:r><w:t>Ph&#242;ng TCCB</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
</w:body></w:document>"#,
    )
    .expect("Should write entry");
    zip.finish().expect("Should finish archive");

    let result = extract_structured(&path, &ExtractLimits::default());
    assert!(result.ok, "extraction failed: {:?}", result.note);
    assert!(result.text.contains("QUYẾT ĐỊNH"));
    assert!(result.text.contains("Điều 1. Bổ nhiệm ông Nguyễn Văn A"));
    // Table cell text is captured through its inner paragraph
    assert!(result.text.contains("Phòng TCCB"));
}

#[test]
fn test_pptx_slides_with_notes() {
    let (_dir, path) = temp_path("trinh-bay.pptx");

    let file = std::fs::File::create(&path).expect("Should create file");
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();

    zip.start_file("ppt/presentation.xml", options)
        .expect("Should start entry");
    zip.write_all(b"<p:presentation/>").expect("Should write entry");

    zip.start_file("ppt/slides/slide1.xml", options)
        .expect("Should start entry");
    zip.write_all(
        br#"<p:sld><p:txBody><a:p><a:r><a:t>K&#7871; ho&#7841;ch n&#259;m</a:t></a:r></a:p></p:txBody></p:sld>"#,
    )
    .expect("Should write entry");

    zip.start_file("ppt/notesSlides/notesSlide1.xml", options)
        .expect("Should start entry");
    zip.write_all(
        br#"<p:notes><a:p><a:r><a:t>nh&#7855;c l&#7841;i s&#7889; li&#7879;u</a:t></a:r></a:p></p:notes>"#,
    )
    .expect("Should write entry");

    zip.start_file("ppt/slides/slide2.xml", options)
        .expect("Should start entry");
    zip.write_all(
        br#"<p:sld><p:txBody><a:p><a:r><a:t>T&#7893;ng k&#7871;t</a:t></a:r></a:p></p:txBody></p:sld>"#,
    )
    .expect("Should write entry");
    zip.finish().expect("Should finish archive");

    let result = extract_structured(&path, &ExtractLimits::default());
    assert!(result.ok, "extraction failed: {:?}", result.note);
    assert_eq!(result.pages.len(), 2);
    assert!(result.pages[0].starts_with("[Slide 1]"));
    assert!(result.pages[0].contains("Kế hoạch năm"));
    assert!(result.pages[0].contains("Ghi chú: nhắc lại số liệu"));
    assert!(result.pages[1].starts_with("[Slide 2]"));
    assert!(result.pages[1].contains("Tổng kết"));
}

#[test]
fn test_corrupt_container_degrades_not_panics() {
    let (_dir, path) = temp_path("hong.docx");
    std::fs::write(&path, b"this is not a zip archive at all, just bytes")
        .expect("Should write file");

    let result = extract_structured(&path, &ExtractLimits::default());
    // Salvage path kicks in: printable ASCII runs are recovered
    assert!(result.text.contains("not a zip archive") || !result.ok);
}

#[test]
fn test_sheet_cell_ceiling_truncates() {
    let (_dir, path) = temp_path("lon.xlsx");

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for row in 0..50u32 {
        for col in 0..4u16 {
            sheet
                .write_string(row, col, format!("ô {}-{}", row, col))
                .expect("Should write cell");
        }
    }
    workbook.save(&path).expect("Should save workbook");

    let limits = ExtractLimits {
        max_cells_per_sheet: 10,
        ..ExtractLimits::default()
    };
    let result = extract_structured(&path, &limits);
    assert!(result.ok);
    assert!(result.text.contains('…'));
    // Content beyond the ceiling is absent
    assert!(!result.text.contains("ô 49-3"));
}
