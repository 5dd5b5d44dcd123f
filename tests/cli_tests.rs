//! Command-line behaviour of the `vcf-annotator` binary.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use flate2::read::MultiGzDecoder;
use predicates::prelude::*;

const DATABASE: &str = "##fileformat=VCFv4.2\n\
##INFO=<ID=AF,Number=A,Type=Float,Description=\"Allele frequency\">\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
chr1\t100\trs1\tA\tG,T\t.\t.\tAF=0.1,0.2\n\
chr1\t200\trs2\tC\tT\t.\t.\tAF=0.5\n\
chr2\t499\trs3\tCATG\tCA\t.\t.\t.\n";

const INPUT: &str = "##fileformat=VCFv4.2\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
chr1\t100\t.\tA\tG,T\t.\t.\t.\n\
chr1\t150\t.\tA\tC\t.\t.\t.\n\
chr2\t500\t.\tATG\tA\t.\t.\t.\n";

fn cmd() -> Command {
    Command::cargo_bin("vcf-annotator").unwrap()
}

fn write_files(dir: &Path, database: &str, input: &str) -> (PathBuf, PathBuf) {
    let db = dir.join("db.vcf");
    let vcf = dir.join("input.vcf");
    fs::write(&db, database).unwrap();
    fs::write(&vcf, input).unwrap();
    (db, vcf)
}

#[test]
fn test_annotate_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let (db, input) = write_files(dir.path(), DATABASE, INPUT);

    cmd()
        .arg("annotate")
        .arg("-i")
        .arg(&input)
        .arg("-a")
        .arg(&db)
        .args(["--info-field", "AF"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tsnp_id\tsnp_pos\tsnp_ref\tsnp_alt\tsnp_info\tsnp_AF\n",
        ))
        // First input allele G is the one found first
        .stdout(predicate::str::contains(
            "chr1\t100\t.\tA\tG,T\t.\t.\t.\trs1\t100\tA\tG\tAF=0.1\t0.1\n",
        ))
        .stdout(predicate::str::contains(
            "chr1\t150\t.\tA\tC\t.\t.\t.\t\t\t\t\t\t\n",
        ))
        .stdout(predicate::str::contains(
            "chr2\t500\t.\tATG\tA\t.\t.\t.\trs3\t499\tCATG\tCA\t.\t\n",
        ))
        .stderr(predicate::str::contains("Annotated 3 records: 2 matched, 1 unmatched"));
}

#[test]
fn test_annotate_from_stdin_with_threads() {
    let dir = tempfile::tempdir().unwrap();
    let (db, input) = write_files(dir.path(), DATABASE, INPUT);

    let sequential = cmd()
        .args(["annotate", "-i"])
        .arg(&input)
        .arg("-a")
        .arg(&db)
        .output()
        .unwrap();
    assert!(sequential.status.success());

    cmd()
        .args(["annotate", "-i", "-", "--threads", "3", "--batch-size", "1", "-a"])
        .arg(&db)
        .write_stdin(INPUT)
        .assert()
        .success()
        .stdout(sequential.stdout);
}

#[test]
fn test_empty_input_writes_header_only() {
    let dir = tempfile::tempdir().unwrap();
    let (db, input) = write_files(
        dir.path(),
        DATABASE,
        "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n",
    );

    let output = cmd()
        .args(["annotate", "-i"])
        .arg(&input)
        .arg("-a")
        .arg(&db)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap().lines().count(), 1);
}

#[test]
fn test_gzip_output_and_missing_value() {
    let dir = tempfile::tempdir().unwrap();
    let (db, input) = write_files(dir.path(), DATABASE, INPUT);
    let out = dir.path().join("out.tsv.gz");

    cmd()
        .args(["annotate", "-i"])
        .arg(&input)
        .arg("-a")
        .arg(&db)
        .arg("-o")
        .arg(&out)
        .args(["--missing-value", "\\N", "--prefix", "dbsnp"])
        .assert()
        .success();

    let mut text = String::new();
    MultiGzDecoder::new(fs::File::open(&out).unwrap())
        .read_to_string(&mut text)
        .unwrap();
    assert!(text.lines().next().unwrap().ends_with("\tdbsnp_info"));
    assert!(text.contains("chr1\t150\t.\tA\tC\t.\t.\t.\t\\N\t\\N\t\\N\t\\N\t\\N\n"));
}

#[test]
fn test_unsorted_database_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (db, input) = write_files(
        dir.path(),
        "chr1\t200\t.\tA\tG\t.\t.\t.\nchr1\t150\t.\tA\tG\t.\t.\t.\n",
        INPUT,
    );

    cmd()
        .args(["annotate", "-i"])
        .arg(&input)
        .arg("-a")
        .arg(&db)
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("not sorted"))
        .stderr(predicate::str::contains("chr1:150"));
}

#[test]
fn test_invalid_info_field_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (db, input) = write_files(dir.path(), DATABASE, INPUT);

    cmd()
        .args(["annotate", "-i"])
        .arg(&input)
        .arg("-a")
        .arg(&db)
        .args(["--info-field", "A F"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid annotation column options"));
}

#[test]
fn test_save_index_conflicts_with_no_cache() {
    cmd()
        .args([
            "annotate",
            "-i",
            "in.vcf",
            "-a",
            "db.vcf",
            "--save-index",
            "--no-index-cache",
        ])
        .assert()
        .failure();
}

#[test]
fn test_save_index_then_reuse() {
    let dir = tempfile::tempdir().unwrap();
    let (db, input) = write_files(dir.path(), DATABASE, INPUT);
    let sidecar = dir.path().join("db.vcf.vai");

    cmd()
        .args(["annotate", "--save-index", "-i"])
        .arg(&input)
        .arg("-a")
        .arg(&db)
        .assert()
        .success();
    assert!(sidecar.exists());

    cmd()
        .args(["--verbose", "annotate", "-i"])
        .arg(&input)
        .arg("-a")
        .arg(&db)
        .assert()
        .success()
        .stderr(predicate::str::contains("Using cached database index"));
}

#[test]
fn test_index_command_json() {
    let dir = tempfile::tempdir().unwrap();
    let (db, _) = write_files(dir.path(), DATABASE, INPUT);
    let out = dir.path().join("custom.vai");

    let output = cmd()
        .args(["index", "--format", "json", "--stride", "1", "-o"])
        .arg(&out)
        .arg(&db)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(out.exists());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["stride"], 1);
    assert_eq!(json["stats"]["records"], 3);
    assert_eq!(json["chromosomes"][0]["name"], "chr1");
    assert_eq!(json["chromosomes"][0]["seek_points"], 2);
    assert_eq!(json["chromosomes"][1]["max_reference_length"], 4);
}

#[test]
fn test_index_command_text() {
    let dir = tempfile::tempdir().unwrap();
    let (db, _) = write_files(dir.path(), DATABASE, INPUT);

    cmd()
        .arg("index")
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("Chromosomes: 2"))
        .stdout(predicate::str::contains("Records: 3"));
    assert!(dir.path().join("db.vcf.vai").exists());
}

#[test]
fn test_missing_database_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (_, input) = write_files(dir.path(), DATABASE, INPUT);

    cmd()
        .args(["annotate", "-i"])
        .arg(&input)
        .args(["-a", "/nonexistent/db.vcf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open"));
}

#[test]
fn test_corrupt_cached_index_is_rebuilt() {
    let dir = tempfile::tempdir().unwrap();
    let (db, input) = write_files(dir.path(), DATABASE, INPUT);
    fs::write(dir.path().join("db.vcf.vai"), b"not an index at all").unwrap();

    cmd()
        .args(["annotate", "-i"])
        .arg(&input)
        .arg("-a")
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("chr1\t100\t.\tA\tG,T\t.\t.\t.\trs1\t"));
}
