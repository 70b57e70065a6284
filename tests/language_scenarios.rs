// SDPL - a statistical data-processing language interpreter.
// Copyright (C) 2026 The SDPL Project
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <http://www.gnu.org/licenses/>.

use sdpl::driver::run_source;
use sdpl::env::Env;
use sdpl::identifier::Identifier;
use sdpl::settings::Settings;

fn id(s: &str) -> Identifier {
    Identifier::new(s).unwrap()
}

fn run(source: &str) -> (Env, String) {
    let mut env = Env::new();
    let settings = Settings::default();
    let mut buf = Vec::new();
    let diags = run_source(source, &mut env, &settings, &mut buf, &|| false).expect("lex succeeds");
    assert!(!diags.has_errors(), "unexpected diagnostics: {:?}", diags.items());
    (env, String::from_utf8(buf).unwrap())
}

#[test]
fn s1_length_preserves_string_padding_verbatim() {
    let source = r#"
        data out; length name $40;
          name="Alice"; output; name="  Bob  "; output;
          name="Charlie  "; output; name="Dana"; output;
        run;
    "#;
    let (env, _) = run(source);
    let dataset = env.dataset(&id("out")).unwrap();
    assert_eq!(dataset.columns.len(), 1);
    assert_eq!(dataset.columns[0].0, id("name"));
    let names: Vec<&str> = dataset.rows.iter().map(|r| r.get(&id("name")).unwrap().as_str().unwrap().trim_end()).collect();
    assert_eq!(names, vec!["Alice", "  Bob", "Charlie  ", "Dana"]);
}

#[test]
fn s2_create_from_scratch_adds_columns_across_iterations() {
    let source = r#"data a; a = 10; output; b = "This is a string variable!"; output; run;"#;
    let (env, _) = run(source);
    let dataset = env.dataset(&id("a")).unwrap();
    let col_names: Vec<String> = dataset.columns.iter().map(|(n, ..)| n.to_string()).collect();
    assert_eq!(col_names, vec!["a", "b"]);
    assert_eq!(dataset.rows.len(), 2);
    assert_eq!(dataset.rows[0].get(&id("a")).unwrap().as_number(), Some(Some(10.0)));
    assert!(dataset.rows[0].get(&id("b")).unwrap().as_str().unwrap().trim_end().is_empty());
    assert_eq!(dataset.rows[1].get(&id("a")).unwrap().as_number(), Some(Some(10.0)));
    assert_eq!(
        dataset.rows[1].get(&id("b")).unwrap().as_str().unwrap().trim_end(),
        "This is a string variable!"
    );
}

#[test]
fn s3_datalines_parses_numeric_and_string_fields() {
    let source = r#"
        data employees; input name $ age; datalines;
john 23
mary 30
;
        run;
    "#;
    let (env, _) = run(source);
    let dataset = env.dataset(&id("employees")).unwrap();
    assert_eq!(dataset.rows.len(), 2);
    assert_eq!(dataset.rows[0].get(&id("name")).unwrap().as_str().unwrap().trim_end(), "john");
    assert_eq!(dataset.rows[0].get(&id("age")).unwrap().as_number(), Some(Some(23.0)));
    assert_eq!(dataset.rows[1].get(&id("name")).unwrap().as_str().unwrap().trim_end(), "mary");
    assert_eq!(dataset.rows[1].get(&id("age")).unwrap().as_number(), Some(Some(30.0)));
}

#[test]
fn s4_arrays_loop_retain_drop_keep_conditional_emit() {
    let source = r#"
        data in; input x num1 num2 num3; datalines;
1 5 10 15
2 10 15 20
3 15 20 25
;
        run;
        data out; set in; retain sum 0; array nums {3} num1 num2 num3;
          do i = 1 to 3; nums{i} = nums{i} + 10; sum = sum + nums{i}; end;
          drop i; keep x sum num1 num2 num3;
          if sum > 25 then output;
        run;
    "#;
    let (env, _) = run(source);
    let dataset = env.dataset(&id("out")).unwrap();
    let col_names: Vec<String> = dataset.columns.iter().map(|(n, ..)| n.to_string()).collect();
    assert_eq!(col_names, vec!["x", "num1", "num2", "num3", "sum"]);

    let row = |i: usize, name: &str| dataset.rows[i].get(&id(name)).unwrap().as_number().unwrap().unwrap();
    assert_eq!(dataset.rows.len(), 3);
    assert_eq!(
        (row(0, "x"), row(0, "num1"), row(0, "num2"), row(0, "num3"), row(0, "sum")),
        (1.0, 15.0, 20.0, 25.0, 60.0)
    );
    assert_eq!(
        (row(1, "x"), row(1, "num1"), row(1, "num2"), row(1, "num3"), row(1, "sum")),
        (2.0, 20.0, 25.0, 30.0, 135.0)
    );
    assert_eq!(
        (row(2, "x"), row(2, "num1"), row(2, "num2"), row(2, "num3"), row(2, "sum")),
        (3.0, 25.0, 30.0, 35.0, 225.0)
    );
}

#[test]
fn s5_sort_nodupkey_keeps_first_occurrence() {
    let source = r#"
        data in; input x y; datalines;
1 100
1 200
2 300
;
        run;
        proc sort data=in out=out nodupkey; by x; run;
    "#;
    let (env, _) = run(source);
    let dataset = env.dataset(&id("out")).unwrap();
    assert_eq!(dataset.rows.len(), 2);
    assert_eq!(dataset.rows[0].get(&id("x")).unwrap().as_number(), Some(Some(1.0)));
    assert_eq!(dataset.rows[0].get(&id("y")).unwrap().as_number(), Some(Some(100.0)));
    assert_eq!(dataset.rows[1].get(&id("x")).unwrap().as_number(), Some(Some(2.0)));
}

#[test]
fn s6_print_emits_header_then_rows_honoring_obs_limit() {
    let source = r#"
        data out; input x; datalines;
1
2
3
;
        run;
        proc print data=out; obs=2; run;
    "#;
    let (_, listing) = run(source);
    let mut lines = listing.lines();
    let header = lines.next().unwrap();
    assert!(header.contains("Obs"));
    assert!(header.contains('x'));
    assert_eq!(lines.count(), 2);
}

#[test]
fn merges_one_to_one_by_shared_key() {
    let source = r#"
        data a; input id x; datalines;
1 10
2 20
;
        run;
        data b; input id y; datalines;
1 100
2 200
;
        run;
        data out; merge a b; by id; run;
    "#;
    let (env, _) = run(source);
    let dataset = env.dataset(&id("out")).unwrap();
    assert_eq!(dataset.rows.len(), 2);
    assert_eq!(dataset.rows[0].get(&id("x")).unwrap().as_number(), Some(Some(10.0)));
    assert_eq!(dataset.rows[0].get(&id("y")).unwrap().as_number(), Some(Some(100.0)));
    assert_eq!(dataset.rows[1].get(&id("x")).unwrap().as_number(), Some(Some(20.0)));
    assert_eq!(dataset.rows[1].get(&id("y")).unwrap().as_number(), Some(Some(200.0)));
}

#[test]
fn do_until_runs_body_once_even_when_condition_holds_at_entry() {
    let source = r#"
        data out; x = 0;
          do until (x > 0); x = x + 1; end;
          output;
        run;
    "#;
    let (env, _) = run(source);
    let dataset = env.dataset(&id("out")).unwrap();
    assert_eq!(dataset.rows[0].get(&id("x")).unwrap().as_number(), Some(Some(1.0)));
}
