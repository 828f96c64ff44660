//! `dedupe review`: the interactive labeling and review loop.
//!
//! One command per line. Which commands apply depends on the workflow
//! state; `?` lists them. Logs go to stderr, everything here to `output`.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use dedupe_client::DedupService;
use dedupe_core::Answer;
use dedupe_review::{
    AppState, ExportMode, Notice, ReviewSession, SortOrder, Submission, TrainingStage, Workflow,
    WorkflowError,
};

use crate::render;
use crate::CliError;

const LABELING_HELP: &str = "\
  y / n / u     label the pair yes, no or unsure
  f             finish training and submit labels
  clear         discard everything and exit
  q             quit";

const IDLE_HELP: &str = "\
  f             find duplicates again
  cols A,B,...  choose the columns to match on
  clear         discard everything and exit
  q             quit";

const REVIEW_HELP: &str = "\
  Enter / next  next group          p     previous group
  s             skip group          u     unskip group
  x N           mark or unmark member N for removal
  a             mark all but the first member of every group
  sort KEY      confidence-desc, confidence-asc or cluster-id
  r             reprocess with the decisions so far
  e [NAME]      export without marked members
  ea [NAME]     export every member
  clear         discard everything and exit
  q             quit";

enum Flow {
    Continue,
    Quit,
}

pub(crate) struct ReviewLoop<'a, S, R, W> {
    workflow: Workflow,
    service: &'a S,
    input: R,
    output: W,
    out_dir: PathBuf,
}

impl<'a, S: DedupService, R: BufRead, W: Write> ReviewLoop<'a, S, R, W> {
    pub(crate) fn new(workflow: Workflow, service: &'a S, input: R, output: W, out_dir: PathBuf) -> Self {
        Self { workflow, service, input, output, out_dir }
    }

    /// Run until `q`, `clear` or end of input. Only the first submission is
    /// fatal on failure; later failures are reported and the loop goes on.
    pub(crate) fn run(mut self) -> Result<Workflow, CliError> {
        self.discover()?;
        loop {
            self.show()?;
            let Some(line) = self.read_line()? else { break };
            if let Flow::Quit = self.dispatch(line.trim())? {
                break;
            }
        }
        Ok(self.workflow)
    }

    fn discover(&mut self) -> Result<(), CliError> {
        let ticket = self.workflow.find_duplicates().map_err(CliError::workflow)?;
        self.say(format!("Submitting {} request...", ticket.kind()))?;
        match self.workflow.run(ticket, self.service) {
            Ok(()) => self.report_notice(),
            Err(e @ WorkflowError::Remote(_)) => {
                self.workflow.take_notice();
                Err(CliError::workflow(e))
            }
            Err(_) => self.report_notice(),
        }
    }

    // -- Input/output --

    fn read_line(&mut self) -> Result<Option<String>, CliError> {
        write!(self.output, "> ")
            .and_then(|_| self.output.flush())
            .map_err(|e| CliError::io(e.to_string()))?;
        let mut line = String::new();
        let read = self.input.read_line(&mut line).map_err(|e| CliError::io(e.to_string()))?;
        Ok((read > 0).then_some(line))
    }

    fn say(&mut self, text: impl AsRef<str>) -> Result<(), CliError> {
        writeln!(self.output, "{}", text.as_ref()).map_err(|e| CliError::io(e.to_string()))
    }

    fn report_notice(&mut self) -> Result<(), CliError> {
        match self.workflow.take_notice() {
            Some(Notice::Info(msg)) => self.say(format!("note: {}", msg)),
            Some(Notice::Error(msg)) => self.say(format!("error: {}", msg)),
            None => Ok(()),
        }
    }

    /// Print a rejected action and carry on.
    fn report(&mut self, result: Result<(), WorkflowError>) -> Result<Flow, CliError> {
        if let Err(e) = result {
            self.say(format!("error: {}", e))?;
        }
        Ok(Flow::Continue)
    }

    fn submit(&mut self, ticket: Submission) -> Result<Flow, CliError> {
        self.say(format!("Submitting {} request...", ticket.kind()))?;
        let result = self.workflow.run(ticket, self.service);
        if self.workflow.notice().is_some() {
            self.report_notice()?;
            return Ok(Flow::Continue);
        }
        self.report(result)
    }

    fn columns(&self) -> Vec<String> {
        self.workflow
            .dataset()
            .map(|d| d.columns.clone())
            .unwrap_or_default()
    }

    // -- Views --

    fn show(&mut self) -> Result<(), CliError> {
        let columns = self.columns();
        let text = match self.workflow.state() {
            AppState::Training(TrainingStage::Labeling(session)) => {
                let progress = session.progress();
                match session.current() {
                    Some(pair) => {
                        let finish = if progress.can_finish() { "  (f to finish)" } else { "" };
                        format!("{}{}\n{}", render::progress(&progress), finish, render::pair(pair, &columns))
                    }
                    None => format!("{}\nBatch complete. f resubmits the labels.", render::progress(&progress)),
                }
            }
            AppState::Reviewing(review) => {
                let min = self.workflow.review_settings().min_reviewed_for_reprocess;
                let marked = review.selection().removal_ids().len();
                let reprocess = if review.can_reprocess(min) { "  (r to reprocess)" } else { "" };
                format!(
                    "{}{} marked for removal{}",
                    render::group(review, &columns),
                    marked,
                    reprocess
                )
            }
            AppState::Training(_) | AppState::Initial => {
                format!("Matching on: {}\n{}", self.workflow.columns().selected().join(", "), IDLE_HELP)
            }
        };
        self.say(text)
    }

    fn help(&mut self) -> Result<Flow, CliError> {
        let text = match self.workflow.state() {
            AppState::Training(TrainingStage::Labeling(_)) => LABELING_HELP,
            AppState::Reviewing(_) => REVIEW_HELP,
            _ => IDLE_HELP,
        };
        self.say(text)?;
        Ok(Flow::Continue)
    }

    // -- Commands --

    fn dispatch(&mut self, line: &str) -> Result<Flow, CliError> {
        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (line, ""),
        };

        match command {
            "q" | "quit" => return Ok(Flow::Quit),
            "?" | "help" => return self.help(),
            "clear" => {
                self.workflow.clear_all();
                self.say("Cleared.")?;
                return Ok(Flow::Quit);
            }
            _ => {}
        }

        match self.workflow.state() {
            AppState::Training(TrainingStage::Labeling(_)) => self.labeling(command),
            AppState::Reviewing(_) => self.reviewing(command, arg),
            AppState::Training(_) | AppState::Initial => self.idle(command, arg),
        }
    }

    fn labeling(&mut self, command: &str) -> Result<Flow, CliError> {
        let answer = match command {
            "" => return Ok(Flow::Continue),
            "f" | "finish" => {
                return match self.workflow.finish_training() {
                    Ok(ticket) => self.submit(ticket),
                    Err(e) => self.report(Err(e)),
                };
            }
            other => match Answer::from_code(other) {
                Some(answer) => answer,
                None => return self.help(),
            },
        };

        match self.workflow.record_response(answer) {
            Ok(Some(ticket)) => self.submit(ticket),
            Ok(None) => Ok(Flow::Continue),
            Err(e) => self.report(Err(e)),
        }
    }

    fn idle(&mut self, command: &str, arg: &str) -> Result<Flow, CliError> {
        match command {
            "" => Ok(Flow::Continue),
            "f" | "find" => match self.workflow.find_duplicates() {
                Ok(ticket) => self.submit(ticket),
                Err(e) => self.report(Err(e)),
            },
            "cols" | "columns" => {
                let names = split_list(arg);
                let result = self.workflow.select_columns(&names);
                self.report(result)
            }
            _ => self.help(),
        }
    }

    fn reviewing(&mut self, command: &str, arg: &str) -> Result<Flow, CliError> {
        match command {
            "" | "next" => self.navigate(|r| r.next()),
            "p" | "prev" | "previous" => self.navigate(|r| r.previous()),
            "s" | "skip" => self.navigate(|r| r.skip()),
            "u" | "unskip" => self.navigate(|r| r.unskip()),
            "a" | "all" => self.navigate(|r| r.select_all_except_first()),
            "sort" => match SortOrder::parse(arg) {
                Some(order) => self.navigate(|r| r.set_sort(order)),
                None => {
                    self.say(format!("error: unknown sort key \"{}\"", arg))?;
                    Ok(Flow::Continue)
                }
            },
            "x" => self.toggle(arg),
            "r" | "reprocess" => match self.workflow.reprocess() {
                Ok(ticket) => self.submit(ticket),
                Err(e) => self.report(Err(e)),
            },
            "e" | "export" => self.export(ExportMode::Cleansed, arg),
            "ea" => self.export(ExportMode::All, arg),
            _ => self.help(),
        }
    }

    fn navigate(&mut self, f: impl FnOnce(&mut ReviewSession)) -> Result<Flow, CliError> {
        let result = self.workflow.review_mut().map(f);
        self.report(result)
    }

    fn toggle(&mut self, arg: &str) -> Result<Flow, CliError> {
        let Some(position) = arg.parse::<usize>().ok().and_then(|n| n.checked_sub(1)) else {
            self.say("error: x takes a member number, e.g. x 2")?;
            return Ok(Flow::Continue);
        };
        let result = self.workflow.review_mut().and_then(|review| {
            let group = review.current_group();
            let marked = group
                .members
                .get(position)
                .is_some_and(|m| review.selection().is_selected(group.cluster_id, &m.id));
            review.toggle_member(position, !marked)
        });
        self.report(result)
    }

    fn export(&mut self, mode: ExportMode, name: &str) -> Result<Flow, CliError> {
        let file = if name.is_empty() {
            self.workflow.export(mode)
        } else {
            self.workflow.export_as(mode, name)
        };
        let written = file.and_then(|f| f.write_to(&self.out_dir).map(|path| (f.rows, path)));
        match written {
            Ok((rows, path)) => self.say(format!("Wrote {} rows to {}", rows, path.display()))?,
            Err(e) => self.say(format!("error: {}", e))?,
        }
        Ok(Flow::Continue)
    }
}

/// Split a comma-separated list, dropping empty entries.
pub(crate) fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io::Cursor;

    use serde_json::{json, Value};

    use dedupe_client::{parse_response, DedupRequest, DedupResponse, RemoteFailure, Upload};
    use dedupe_core::SourceRows;
    use dedupe_review::LoadedDataset;

    struct Scripted {
        responses: RefCell<VecDeque<Result<Value, RemoteFailure>>>,
        requests: RefCell<Vec<DedupRequest>>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<Value, RemoteFailure>>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl DedupService for Scripted {
        fn submit(&self, request: &DedupRequest) -> Result<DedupResponse, RemoteFailure> {
            self.requests.borrow_mut().push(request.clone());
            let next = self
                .responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(RemoteFailure::Network("no more responses".into())));
            next.and_then(parse_response)
        }
    }

    fn workflow() -> Workflow {
        let rows = (0..6)
            .map(|i| {
                json!({"name": format!("n{i}"), "city": "oslo"})
                    .as_object()
                    .cloned()
                    .unwrap()
            })
            .collect();
        let mut wf = Workflow::default();
        wf.load_dataset(LoadedDataset::new(
            Upload::new("people.csv", b"name,city\n".to_vec()),
            vec![SourceRows::new("people.csv", rows)],
            vec!["name".into(), "city".into()],
        ))
        .unwrap();
        wf.select_columns(&["name", "city"]).unwrap();
        wf
    }

    fn groups() -> Value {
        json!({
            "status": "success",
            "duplicates": [
                {"cluster_id": 0, "confidence_score": 0.9, "records": [
                    {"name": "n0", "city": "oslo", "record_id": "0"},
                    {"name": "n1", "city": "oslo", "record_id": "1"}
                ]},
                {"cluster_id": 1, "confidence_score": 0.6, "records": [
                    {"name": "n2", "city": "oslo", "record_id": "2"},
                    {"name": "n3", "city": "oslo", "record_id": "3"},
                    {"name": "n4", "city": "oslo", "record_id": "4"}
                ]}
            ]
        })
    }

    fn training(n: usize) -> Value {
        let pairs: Vec<Value> = (0..n)
            .map(|i| json!({"0": {"name": format!("a{i}")}, "1": {"name": format!("b{i}")}}))
            .collect();
        json!({"status": "needs_training", "pairs": pairs})
    }

    fn drive(service: &Scripted, script: &str, dir: &std::path::Path) -> (Result<Workflow, CliError>, String) {
        let mut out = Vec::new();
        let result = ReviewLoop::new(workflow(), service, Cursor::new(script.to_string()), &mut out, dir.to_path_buf()).run();
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn first_failure_is_fatal() {
        let service = Scripted::new(vec![Err(RemoteFailure::Http(503, "down".into()))]);
        let dir = tempfile::tempdir().unwrap();
        let (result, _) = drive(&service, "q\n", dir.path());
        let err = result.err().unwrap();
        assert_eq!(err.code, crate::exit_codes::EXIT_REMOTE_HTTP);
        assert_eq!(err.message, "HTTP 503: down");
    }

    #[test]
    fn mark_and_export_cleansed() {
        let service = Scripted::new(vec![Ok(groups())]);
        let dir = tempfile::tempdir().unwrap();
        let (result, out) = drive(&service, "x 2\n\nx 3\ne\nea everything\nq\n", dir.path());
        let wf = result.unwrap();

        assert_eq!(wf.review().unwrap().selection().removal_ids().len(), 2);
        assert!(out.contains("Wrote 3 rows"));
        assert!(out.contains("Wrote 5 rows"));
        let cleansed = std::fs::read_to_string(dir.path().join("duplicate_groups_cleansed.csv")).unwrap();
        assert_eq!(cleansed.lines().count(), 4);
        assert!(!cleansed.contains("n1") && !cleansed.contains("n4"));
        assert!(dir.path().join("everything.csv").exists());
    }

    #[test]
    fn toggle_twice_unmarks() {
        let service = Scripted::new(vec![Ok(groups())]);
        let dir = tempfile::tempdir().unwrap();
        let (result, out) = drive(&service, "x 2\nx 2\nx 9\nx zero\nq\n", dir.path());
        assert!(result.unwrap().review().unwrap().selection().is_empty());
        assert!(out.contains("error: not available: no such member"));
        assert!(out.contains("error: x takes a member number"));
    }

    #[test]
    fn labeling_auto_submits_exhausted_batch() {
        let service = Scripted::new(vec![Ok(training(10)), Ok(groups())]);
        let dir = tempfile::tempdir().unwrap();
        let script = "y\nn\ny\nn\nu\nu\nu\nu\nu\ny\nq\n";
        let (result, out) = drive(&service, script, dir.path());
        let wf = result.unwrap();

        assert!(wf.review().is_some());
        assert_eq!(service.requests.borrow().len(), 2);
        assert_eq!(service.requests.borrow()[1].labeled_pair_count(), 5);
        assert!(out.contains("Submitting train request"));
    }

    #[test]
    fn failed_retrain_keeps_labels_for_retry() {
        let service = Scripted::new(vec![
            Ok(training(10)),
            Err(RemoteFailure::Timeout("slow".into())),
            Ok(groups()),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let script = format!("{}f\nq\n", "y\n".repeat(10));
        let (result, out) = drive(&service, &script, dir.path());

        assert!(out.contains("error: Timeout: slow"));
        assert!(out.contains("Batch complete"));
        assert!(result.unwrap().review().is_some());
        assert_eq!(service.requests.borrow()[2].labeled_pair_count(), 10);
    }

    #[test]
    fn empty_result_offers_retry() {
        let empty = json!({"status": "success", "duplicates": []});
        let service = Scripted::new(vec![Ok(empty), Ok(groups())]);
        let dir = tempfile::tempdir().unwrap();
        let (result, out) = drive(&service, "cols name\nf\ncols name,city\nf\nq\n", dir.path());

        assert!(out.contains("note: No duplicates found. Need more training data."));
        // one column is refused before anything is sent
        assert!(out.contains("error: "));
        assert_eq!(service.requests.borrow().len(), 2);
        assert!(result.unwrap().review().is_some());
    }

    #[test]
    fn reprocess_is_gated() {
        let service = Scripted::new(vec![Ok(groups())]);
        let dir = tempfile::tempdir().unwrap();
        let (result, out) = drive(&service, "r\nq\n", dir.path());
        assert!(out.contains("error: not available"));
        assert_eq!(service.requests.borrow().len(), 1);
        assert!(result.is_ok());
    }

    #[test]
    fn clear_ends_the_session() {
        let service = Scripted::new(vec![Ok(groups())]);
        let dir = tempfile::tempdir().unwrap();
        let (result, out) = drive(&service, "clear\nnext\n", dir.path());
        let wf = result.unwrap();
        assert!(out.contains("Cleared."));
        assert!(wf.dataset().is_none());
        assert_eq!(wf.state().name(), AppState::Initial.name());
    }

    #[test]
    fn list_splitting() {
        assert_eq!(split_list(" a, b ,,c"), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }
}
