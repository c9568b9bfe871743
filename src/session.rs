// src/session.rs

//! Quiz-taking session.
//!
//! [`QuizSession`] is the synchronous state machine: question sequencing,
//! answer locking, scoring and the countdown. [`spawn_session`] wraps one in a
//! task that ticks the countdown, applies commands in arrival order, and hands
//! the finished attempt to the recorder exactly once.

use std::{fmt, sync::Arc, time::Duration};

use serde::Serialize;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use validator::Validate;

use crate::{
    models::quiz::{Question, Quiz},
    navigation::Route,
    recorder::AttemptRecorder,
};

/// Used when a quiz carries no duration of its own.
pub const DEFAULT_DURATION_SECS: u32 = 300;

const COMMAND_BUFFER: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A question's `correct_answer` does not index its options.
    InvalidQuestion { index: usize },
    /// The session already ended.
    Finished,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidQuestion { index } => write!(
                f,
                "question {} has a correct answer outside its options",
                index
            ),
            SessionError::Finished => write!(f, "quiz session already finished"),
        }
    }
}

impl std::error::Error for SessionError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "question", rename_all = "camelCase")]
pub enum SessionState {
    /// No questions yet. Nothing can be answered, but the clock runs.
    Loading,
    AwaitingAnswer(usize),
    AnswerLocked(usize),
    Terminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EndReason {
    Completed,
    TimedOut,
}

/// Result of a `select` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Selection {
    Accepted { correct: bool },
    /// Wrong question, answer already locked, option out of range, or no
    /// longer running.
    Ignored,
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOutcome {
    pub quiz_id: Option<String>,
    pub quiz_title: Option<String>,
    pub grade_percentage: u32,
    pub correct_count: u32,
    pub total_questions: usize,
    pub reason: EndReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub text: String,
    pub options: Vec<String>,
    /// Only revealed once an answer is locked in.
    pub correct_option: Option<usize>,
}

/// What the question screen renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub quiz_id: Option<String>,
    pub quiz_title: Option<String>,
    pub question_index: usize,
    pub total_questions: usize,
    pub question: Option<QuestionView>,
    pub selected_option: Option<usize>,
    pub correct_count: u32,
    pub remaining_secs: u32,
    /// `MM:SS`
    pub remaining: String,
    pub outcome: Option<SessionOutcome>,
}

/// `floor(correct * 100 / total)`, or 0 with no questions.
pub fn grade_percentage(correct: u32, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (u64::from(correct) * 100 / total as u64) as u32
}

pub fn format_remaining(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn validate_questions(questions: &[Question]) -> Result<(), SessionError> {
    for (index, question) in questions.iter().enumerate() {
        if question.validate().is_err() {
            return Err(SessionError::InvalidQuestion { index });
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct QuizSession {
    quiz_id: Option<String>,
    quiz_title: Option<String>,
    questions: Vec<Question>,
    state: SessionState,
    question_index: usize,
    selected: Option<usize>,
    correct_count: u32,
    remaining_secs: u32,
    outcome: Option<SessionOutcome>,
}

impl QuizSession {
    /// Builds a session for `quiz_id`.
    ///
    /// The countdown starts from the quiz's duration, or `default_duration_secs`
    /// when the quiz is unknown or has none. Without a quiz id the questions are
    /// dropped: the clock still runs and the session scores 0.
    pub fn new(
        quiz_id: Option<String>,
        quiz: Option<&Quiz>,
        questions: Vec<Question>,
        default_duration_secs: u32,
    ) -> Result<Self, SessionError> {
        let questions = if quiz_id.is_some() { questions } else { Vec::new() };
        validate_questions(&questions)?;

        let state = if questions.is_empty() {
            SessionState::Loading
        } else {
            SessionState::AwaitingAnswer(0)
        };

        Ok(Self {
            quiz_id,
            quiz_title: quiz.map(|q| q.title.clone()),
            questions,
            state,
            question_index: 0,
            selected: None,
            correct_count: 0,
            remaining_secs: quiz
                .and_then(Quiz::effective_duration)
                .unwrap_or(default_duration_secs),
            outcome: None,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.state == SessionState::Terminal
    }

    /// Supplies questions that arrived after the session started. Only a
    /// loading session with a quiz id takes them; otherwise this is a no-op.
    pub fn attach_questions(&mut self, questions: Vec<Question>) -> Result<(), SessionError> {
        if self.state != SessionState::Loading || self.quiz_id.is_none() {
            return Ok(());
        }
        validate_questions(&questions)?;

        if !questions.is_empty() {
            self.questions = questions;
            self.question_index = 0;
            self.state = SessionState::AwaitingAnswer(0);
        }
        Ok(())
    }

    /// Locks in `option` for `question`. First selection wins.
    pub fn select(&mut self, question: usize, option: usize) -> Selection {
        if self.state != SessionState::AwaitingAnswer(question) {
            return Selection::Ignored;
        }
        let current = &self.questions[question];
        if option >= current.options.len() {
            return Selection::Ignored;
        }

        let correct = option == current.correct_answer;
        if correct {
            self.correct_count += 1;
        }
        self.selected = Some(option);
        self.state = SessionState::AnswerLocked(question);
        Selection::Accepted { correct }
    }

    /// Moves past a locked answer. Returns the outcome when that was the last question.
    pub fn advance(&mut self) -> Option<SessionOutcome> {
        let SessionState::AnswerLocked(index) = self.state else {
            return None;
        };

        if index + 1 < self.questions.len() {
            self.question_index = index + 1;
            self.selected = None;
            self.state = SessionState::AwaitingAnswer(index + 1);
            None
        } else {
            Some(self.finish(EndReason::Completed))
        }
    }

    /// One second passes. Returns the outcome when the clock runs out.
    pub fn tick(&mut self) -> Option<SessionOutcome> {
        if self.is_terminal() {
            return None;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            return Some(self.finish(EndReason::TimedOut));
        }
        None
    }

    fn finish(&mut self, reason: EndReason) -> SessionOutcome {
        let outcome = SessionOutcome {
            quiz_id: self.quiz_id.clone(),
            quiz_title: self.quiz_title.clone(),
            grade_percentage: grade_percentage(self.correct_count, self.questions.len()),
            correct_count: self.correct_count,
            total_questions: self.questions.len(),
            reason,
        };
        self.state = SessionState::Terminal;
        self.outcome = Some(outcome.clone());
        outcome
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let question = match self.state {
            SessionState::AwaitingAnswer(i) | SessionState::AnswerLocked(i) => {
                let q = &self.questions[i];
                Some(QuestionView {
                    text: q.text.clone(),
                    options: q.options.clone(),
                    correct_option: matches!(self.state, SessionState::AnswerLocked(_))
                        .then_some(q.correct_answer),
                })
            }
            _ => None,
        };

        SessionSnapshot {
            state: self.state,
            quiz_id: self.quiz_id.clone(),
            quiz_title: self.quiz_title.clone(),
            question_index: self.question_index,
            total_questions: self.questions.len(),
            question,
            selected_option: self.selected,
            correct_count: self.correct_count,
            remaining_secs: self.remaining_secs,
            remaining: format_remaining(self.remaining_secs),
            outcome: self.outcome.clone(),
        }
    }
}

enum SessionCommand {
    Select {
        question: usize,
        option: usize,
        reply: oneshot::Sender<(Selection, SessionSnapshot)>,
    },
    Advance {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    AttachQuestions {
        questions: Vec<Question>,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
}

/// Who the finished attempt belongs to and how fast the clock runs.
#[derive(Clone)]
pub struct SessionContext {
    pub recorder: Arc<AttemptRecorder>,
    pub user_id: Option<String>,
    pub tick: Duration,
}

/// Owner's handle on a running session. Dropping it abandons the session
/// without recording anything.
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<SessionSnapshot>,
    route: watch::Receiver<Option<Route>>,
    task: JoinHandle<()>,
}

/// Starts the countdown and command loop for `session`.
pub fn spawn_session(mut session: QuizSession, ctx: SessionContext) -> SessionHandle {
    let (commands, mut inbox) = mpsc::channel(COMMAND_BUFFER);
    let (snapshot_tx, snapshots) = watch::channel(session.snapshot());
    let (route_tx, route) = watch::channel(None);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + ctx.tick, ctx.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let outcome = loop {
            let ended = tokio::select! {
                _ = ticker.tick() => session.tick(),
                command = inbox.recv() => match command {
                    Some(SessionCommand::Select { question, option, reply }) => {
                        let selection = session.select(question, option);
                        let _ = reply.send((selection, session.snapshot()));
                        None
                    }
                    Some(SessionCommand::Advance { reply }) => {
                        let ended = session.advance();
                        let _ = reply.send(session.snapshot());
                        ended
                    }
                    Some(SessionCommand::AttachQuestions { questions, reply }) => {
                        let result = session.attach_questions(questions).map(|_| session.snapshot());
                        let _ = reply.send(result);
                        None
                    }
                    None => {
                        tracing::debug!(quiz_id = ?session.quiz_id, "Quiz session abandoned");
                        return;
                    }
                },
            };

            snapshot_tx.send_replace(session.snapshot());
            if let Some(outcome) = ended {
                break outcome;
            }
        };

        tracing::info!(
            quiz_id = ?outcome.quiz_id,
            grade = outcome.grade_percentage,
            reason = ?outcome.reason,
            "Quiz session finished"
        );

        ctx.recorder
            .record(
                ctx.user_id.as_deref(),
                outcome.quiz_id.as_deref(),
                outcome.quiz_title.as_deref(),
                Some(outcome.grade_percentage),
            )
            .await;

        route_tx.send_replace(Some(Route::grades(outcome.grade_percentage)));
    });

    SessionHandle {
        commands,
        snapshots,
        route,
        task,
    }
}

impl SessionHandle {
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Where to navigate once the session is over and its attempt handed off.
    pub fn route(&self) -> Option<Route> {
        self.route.borrow().clone()
    }

    /// Waits for the end of the session. `None` if it was torn down instead.
    pub async fn finished(&self) -> Option<Route> {
        self.finished_signal().await
    }

    /// Same as [`finished`](Self::finished), but detached from the handle so
    /// waiting on it does not keep the session alive.
    pub fn finished_signal(&self) -> impl Future<Output = Option<Route>> + Send + 'static {
        let mut route = self.route.clone();
        async move {
            route
                .wait_for(Option::is_some)
                .await
                .ok()
                .and_then(|r| r.clone())
        }
    }

    pub async fn select(
        &self,
        question: usize,
        option: usize,
    ) -> Result<(Selection, SessionSnapshot), SessionError> {
        let (reply, answer) = oneshot::channel();
        self.send(SessionCommand::Select {
            question,
            option,
            reply,
        })
        .await?;
        answer.await.map_err(|_| SessionError::Finished)
    }

    pub async fn advance(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply, answer) = oneshot::channel();
        self.send(SessionCommand::Advance { reply }).await?;
        answer.await.map_err(|_| SessionError::Finished)
    }

    pub async fn attach_questions(
        &self,
        questions: Vec<Question>,
    ) -> Result<SessionSnapshot, SessionError> {
        let (reply, answer) = oneshot::channel();
        self.send(SessionCommand::AttachQuestions { questions, reply })
            .await?;
        answer.await.map_err(|_| SessionError::Finished)?
    }

    async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Finished)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        recorder::attempts_path,
        store::{MemoryStore, RemoteStore},
    };

    fn question(correct: usize) -> Question {
        Question {
            text: format!("pick {}", correct),
            options: vec!["a".into(), "b".into(), "c".into()],
            correct_answer: correct,
        }
    }

    fn quiz(duration: Option<u32>) -> Quiz {
        Quiz {
            id: "q1".into(),
            title: "Sample".into(),
            duration,
            ..Default::default()
        }
    }

    fn session(correct: &[usize], duration: Option<u32>) -> QuizSession {
        let quiz = quiz(duration);
        let questions = correct.iter().map(|&c| question(c)).collect();
        QuizSession::new(Some("q1".into()), Some(&quiz), questions, DEFAULT_DURATION_SECS).unwrap()
    }

    fn answer_all(s: &mut QuizSession, picks: &[usize]) -> Option<SessionOutcome> {
        let mut outcome = None;
        for (i, &pick) in picks.iter().enumerate() {
            s.select(i, pick);
            outcome = s.advance();
        }
        outcome
    }

    #[test]
    fn grade_truncates() {
        assert_eq!(grade_percentage(2, 3), 66);
        assert_eq!(grade_percentage(1, 3), 33);
        assert_eq!(grade_percentage(3, 3), 100);
        assert_eq!(grade_percentage(0, 0), 0);
    }

    #[test]
    fn all_correct_scores_100() {
        let correct = [1, 0, 2, 2, 1];
        let mut s = session(&correct, Some(60));
        let outcome = answer_all(&mut s, &correct).unwrap();
        assert_eq!(outcome.grade_percentage, 100);
        assert_eq!(outcome.reason, EndReason::Completed);
        assert!(s.is_terminal());
    }

    #[test]
    fn none_correct_scores_0() {
        let correct = [1, 0, 2];
        let mut s = session(&correct, Some(60));
        let outcome = answer_all(&mut s, &[0, 1, 0]).unwrap();
        assert_eq!(outcome.grade_percentage, 0);
    }

    #[test]
    fn two_of_three_is_66() {
        let mut s = session(&[0, 0, 0], Some(60));
        let outcome = answer_all(&mut s, &[0, 0, 1]).unwrap();
        assert_eq!(outcome.grade_percentage, 66);
    }

    #[test]
    fn first_selection_wins() {
        let mut s = session(&[1, 0], Some(60));
        assert_eq!(s.select(0, 0), Selection::Accepted { correct: false });
        assert_eq!(s.select(0, 1), Selection::Ignored);
        assert_eq!(s.correct_count(), 0);
        assert_eq!(s.state(), SessionState::AnswerLocked(0));
    }

    #[test]
    fn selecting_for_another_question_is_ignored() {
        let mut s = session(&[1, 0], Some(60));
        assert_eq!(s.select(1, 0), Selection::Ignored);
        assert_eq!(s.select(0, 7), Selection::Ignored);
        assert_eq!(s.state(), SessionState::AwaitingAnswer(0));
    }

    #[test]
    fn advance_requires_a_locked_answer() {
        let mut s = session(&[1, 0], Some(60));
        assert_eq!(s.advance(), None);
        assert_eq!(s.state(), SessionState::AwaitingAnswer(0));

        s.select(0, 1);
        assert_eq!(s.advance(), None);
        assert_eq!(s.state(), SessionState::AwaitingAnswer(1));
        assert_eq!(s.snapshot().selected_option, None);
    }

    #[test]
    fn countdown_terminates_exactly_once() {
        let mut s = session(&[1, 0], Some(3));
        s.select(0, 1);

        assert_eq!(s.tick(), None);
        assert_eq!(s.tick(), None);
        let outcome = s.tick().unwrap();
        assert_eq!(outcome.reason, EndReason::TimedOut);
        assert_eq!(outcome.grade_percentage, 50);

        assert_eq!(s.tick(), None);
        assert_eq!(s.remaining_secs(), 0);
        assert_eq!(s.advance(), None);
        assert_eq!(s.select(1, 0), Selection::Ignored);
    }

    #[test]
    fn timeout_preempts_unanswered_question() {
        let mut s = session(&[1, 0], Some(1));
        let outcome = s.tick().unwrap();
        assert_eq!(outcome.grade_percentage, 0);
        assert_eq!(s.state(), SessionState::Terminal);
    }

    #[test]
    fn missing_duration_falls_back_to_default() {
        assert_eq!(session(&[0], None).remaining_secs(), DEFAULT_DURATION_SECS);
        assert_eq!(session(&[0], Some(0)).remaining_secs(), DEFAULT_DURATION_SECS);
        assert_eq!(session(&[0], Some(10)).snapshot().remaining, "00:10");
        assert_eq!(format_remaining(300), "05:00");
    }

    #[test]
    fn empty_questions_report_loading_and_score_zero() {
        let mut s = QuizSession::new(Some("q1".into()), Some(&quiz(Some(2))), vec![], 300).unwrap();
        assert_eq!(s.state(), SessionState::Loading);
        assert_eq!(s.select(0, 0), Selection::Ignored);
        assert_eq!(s.tick(), None);
        assert_eq!(s.tick().unwrap().grade_percentage, 0);
    }

    #[test]
    fn questions_can_arrive_while_loading() {
        let mut s = QuizSession::new(Some("q1".into()), Some(&quiz(Some(60))), vec![], 300).unwrap();
        s.attach_questions(vec![question(2)]).unwrap();
        assert_eq!(s.state(), SessionState::AwaitingAnswer(0));
        s.select(0, 2);
        assert_eq!(s.advance().unwrap().grade_percentage, 100);
    }

    #[test]
    fn missing_quiz_id_always_scores_zero() {
        let mut s = QuizSession::new(None, None, vec![question(0)], 300).unwrap();
        assert_eq!(s.state(), SessionState::Loading);
        assert_eq!(s.remaining_secs(), 300);
        s.attach_questions(vec![question(0)]).unwrap();
        assert_eq!(s.state(), SessionState::Loading);
        assert_eq!(s.select(0, 0), Selection::Ignored);

        let outcome = (0..300).find_map(|_| s.tick()).unwrap();
        assert_eq!(outcome.grade_percentage, 0);
        assert_eq!(outcome.quiz_id, None);
    }

    #[test]
    fn out_of_range_correct_answer_is_rejected() {
        let bad = Question {
            text: "?".into(),
            options: vec!["a".into(), "b".into()],
            correct_answer: 2,
        };
        let err = QuizSession::new(Some("q1".into()), None, vec![question(0), bad], 300).unwrap_err();
        assert_eq!(err, SessionError::InvalidQuestion { index: 1 });
    }

    #[test]
    fn snapshot_reveals_answer_only_after_locking() {
        let mut s = session(&[2], Some(60));
        assert_eq!(s.snapshot().question.unwrap().correct_option, None);
        s.select(0, 0);
        assert_eq!(s.snapshot().question.unwrap().correct_option, Some(2));
    }

    fn context(store: Arc<dyn RemoteStore>, user_id: Option<&str>) -> SessionContext {
        SessionContext {
            recorder: Arc::new(AttemptRecorder::new(store)),
            user_id: user_id.map(str::to_owned),
            tick: Duration::from_secs(1),
        }
    }

    async fn recorded_grades(store: &dyn RemoteStore, user_id: &str) -> Vec<u64> {
        let log = store.get_once(&attempts_path(user_id)).await.unwrap();
        log.and_then(|v| v.as_object().cloned())
            .map(|m| {
                m.values()
                    .map(|a| a["gradePercentage"].as_u64().unwrap())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[tokio::test(start_paused = true)]
    async fn answering_everything_records_once_and_navigates() {
        let store: Arc<dyn RemoteStore> = Arc::new(MemoryStore::new());
        let handle = spawn_session(session(&[1, 0], Some(10)), context(store.clone(), Some("u1")));

        let (selection, _) = handle.select(0, 1).await.unwrap();
        assert_eq!(selection, Selection::Accepted { correct: true });
        handle.advance().await.unwrap();
        handle.select(1, 0).await.unwrap();
        let last = handle.advance().await.unwrap();
        assert_eq!(last.state, SessionState::Terminal);

        let route = handle.finished().await.unwrap();
        assert_eq!(route.to_string(), "grades_screen/100");
        assert_eq!(recorded_grades(store.as_ref(), "u1").await, vec![100]);

        // The clock stopped with the session: nothing else gets recorded.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(recorded_grades(store.as_ref(), "u1").await, vec![100]);
        assert!(matches!(handle.advance().await, Err(SessionError::Finished)));
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_forces_termination_with_zero_grade() {
        let store: Arc<dyn RemoteStore> = Arc::new(MemoryStore::new());
        let started = Instant::now();
        let handle = spawn_session(session(&[1, 0], Some(10)), context(store.clone(), Some("u1")));

        let route = handle.finished().await.unwrap();
        assert_eq!(route, Route::grades(0));
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert_eq!(handle.snapshot().remaining_secs, 0);
        assert_eq!(recorded_grades(store.as_ref(), "u1").await, vec![0]);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_after_partial_answers_keeps_earned_points() {
        let store: Arc<dyn RemoteStore> = Arc::new(MemoryStore::new());
        let handle = spawn_session(session(&[1, 0, 2, 2], Some(5)), context(store.clone(), Some("u1")));

        handle.select(0, 1).await.unwrap();
        handle.advance().await.unwrap();
        handle.select(1, 0).await.unwrap();

        assert_eq!(handle.finished().await.unwrap(), Route::grades(50));
        assert_eq!(recorded_grades(store.as_ref(), "u1").await, vec![50]);
    }

    #[tokio::test(start_paused = true)]
    async fn anonymous_session_navigates_without_recording() {
        let store: Arc<dyn RemoteStore> = Arc::new(MemoryStore::new());
        let s = QuizSession::new(None, None, vec![], 3).unwrap();
        let handle = spawn_session(s, context(store.clone(), Some("u1")));

        assert_eq!(handle.finished().await.unwrap(), Route::grades(0));
        assert!(recorded_grades(store.as_ref(), "u1").await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_abandons_the_session() {
        let store: Arc<dyn RemoteStore> = Arc::new(MemoryStore::new());
        let handle = spawn_session(session(&[1], Some(2)), context(store.clone(), Some("u1")));
        drop(handle);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(recorded_grades(store.as_ref(), "u1").await.is_empty());
    }
}
