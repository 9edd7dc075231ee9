// CausX - Rust library for constraint-based causal structure search
//         using conditional-independence oracles
// Copyright (C) 2021 - Aleks Kissinger
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#[cfg(test)]
mod test {
    use assert_cmd::Command;
    use predicates::prelude::*;
    use predicates::str::contains;
    use rstest::{fixture, rstest};

    const DIAMOND: &str = "../test_files/diamond.txt";
    const LATENT: &str = "../test_files/latent.txt";
    const COLLIDER: &str = "../test_files/collider.txt";

    #[fixture]
    fn cmd() -> Command {
        let mut cmd = Command::cargo_bin("causx").unwrap();
        cmd.arg("search");
        cmd
    }

    #[rstest]
    fn default_is_pc(mut cmd: Command) {
        cmd.arg(DIAMOND)
            .assert()
            .success()
            .stdout(contains("X1 --- X2"))
            .stdout(contains("X1 --- X3"))
            .stdout(contains("X2 --> X4"))
            .stdout(contains("X3 --> X4"));
    }

    #[rstest]
    #[case("pc")]
    #[case("cpc")]
    #[case("fci")]
    #[case("ccd")]
    fn every_algorithm_runs(mut cmd: Command, #[case] alg: &str) {
        cmd.arg(COLLIDER).arg("--algorithm").arg(alg).assert().success().stdout(contains("A, B, C, D"));
    }

    #[rstest]
    fn fci_finds_latent_confounder(mut cmd: Command) {
        cmd.arg(LATENT)
            .args(["-a", "fci"])
            .assert()
            .success()
            .stdout(contains("A o-> B"))
            .stdout(contains("B <-> C"))
            .stdout(contains("C <-o D"))
            .stdout(contains("L").not());
    }

    #[rstest]
    fn knowledge_orients_pattern(mut cmd: Command) {
        cmd.arg(DIAMOND)
            .args(["--knowledge", "../test_files/diamond_tiers.txt"])
            .assert()
            .success()
            .stdout(contains("X1 --> X2"))
            .stdout(contains("X1 --> X3"));
    }

    #[rstest]
    fn ccd_rejects_required_edges(mut cmd: Command) {
        cmd.arg(COLLIDER)
            .args(["-a", "ccd", "-k", "../test_files/require_ac.txt"])
            .assert()
            .failure()
            .stderr(contains("Search failed: unsupported"));
    }

    #[rstest]
    fn params_file_and_override(mut cmd: Command) {
        // depth 1 cannot separate X1 from X4
        cmd.arg(DIAMOND)
            .args(["--params", "../test_files/params.json"])
            .assert()
            .success()
            .stdout(contains("X1 --> X4"));

        let mut cmd2 = Command::cargo_bin("causx").unwrap();
        cmd2.arg("search")
            .arg(DIAMOND)
            .args(["--params", "../test_files/params.json", "--depth", "2"])
            .assert()
            .success()
            .stdout(contains("X4").and(contains("X1 --> X4").not()));
    }

    #[rstest]
    fn json_output(mut cmd: Command) {
        let out = cmd.arg(COLLIDER).arg("--json").assert().success().get_output().stdout.clone();
        let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(v["graph"]["nodes"].as_array().map(|a| a.len()), Some(4));
        assert_eq!(v["report"]["colliders"].as_array().map(|a| a.len()), Some(1));
        assert!(v["sepsets"].as_array().is_some_and(|a| !a.is_empty()));
    }

    #[rstest]
    fn write_to_file(mut cmd: Command) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pattern.txt");
        cmd.arg(COLLIDER).arg("--out").arg(&path).assert().success().stdout("");
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("A --> C"));
        assert!(written.contains("C --> D"));
    }

    #[rstest]
    fn doesnt_exist(mut cmd: Command) {
        cmd.arg("blah").assert().failure().stderr(contains("IO error"));
    }

    #[rstest]
    fn bad_graph(mut cmd: Command) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        std::fs::write(&path, "A ==> B\n").unwrap();
        cmd.arg(&path)
            .assert()
            .failure()
            .stderr(contains("Error parsing graph: line 1"));
    }

    #[test]
    fn compare_with_itself() {
        Command::cargo_bin("causx")
            .unwrap()
            .args(["compare", DIAMOND, DIAMOND])
            .assert()
            .success()
            .stdout(contains("shd: 0"))
            .stdout(contains("equal: true"));
    }

    #[test]
    fn compare_pattern_to_reference_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let est = dir.path().join("est.txt");
        Command::cargo_bin("causx")
            .unwrap()
            .args(["search", DIAMOND, "--out"])
            .arg(&est)
            .assert()
            .success();
        Command::cargo_bin("causx")
            .unwrap()
            .arg("compare")
            .arg(&est)
            .args([DIAMOND, "--pattern", "--json"])
            .assert()
            .success()
            .stdout(contains("\"shd\": 0"));
    }

    #[test]
    fn random_is_seeded() {
        let run = || {
            Command::cargo_bin("causx")
                .unwrap()
                .args(["random", "-n", "6", "-e", "7", "--seed", "11"])
                .assert()
                .success()
                .get_output()
                .stdout
                .clone()
        };
        let out = run();
        assert_eq!(out, run());
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 8);
        assert!(text.starts_with("X1, X2, X3, X4, X5, X6"));
    }
}
