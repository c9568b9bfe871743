// src/navigation.rs

//! Routes the quiz flow hands to the presentation layer.

use std::{fmt, str::FromStr};

pub const QUESTION_SCREEN: &str = "question_screen";
pub const GRADES_SCREEN: &str = "grades_screen";

#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// `question_screen/{quizId}`
    QuestionScreen { quiz_id: String },
    /// `grades_screen/{gradePercentage}`
    GradesScreen { grade_percentage: f64 },
}

impl Route {
    pub fn grades(grade: u32) -> Self {
        Route::GradesScreen {
            grade_percentage: grade as f64,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::QuestionScreen { quiz_id } => write!(f, "{}/{}", QUESTION_SCREEN, quiz_id),
            Route::GradesScreen { grade_percentage } => {
                write!(f, "{}/{}", GRADES_SCREEN, grade_percentage)
            }
        }
    }
}

impl FromStr for Route {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (screen, arg) = s
            .split_once('/')
            .ok_or_else(|| format!("route '{}' has no argument", s))?;

        match screen {
            QUESTION_SCREEN => Ok(Route::QuestionScreen {
                quiz_id: arg.to_string(),
            }),
            GRADES_SCREEN => arg
                .parse::<f64>()
                .map(|grade_percentage| Route::GradesScreen { grade_percentage })
                .map_err(|e| format!("bad grade '{}': {}", arg, e)),
            other => Err(format!("unknown screen '{}'", other)),
        }
    }
}

/// Headline the grade screen shows for a percentage.
pub fn grade_message(grade_percentage: f64) -> &'static str {
    if grade_percentage < 40.0 {
        "Oh No! You might want to retake the quiz"
    } else if grade_percentage <= 70.0 {
        "Good effort!"
    } else {
        "Great job! You did well"
    }
}
