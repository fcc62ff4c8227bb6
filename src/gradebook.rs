use std::collections::HashMap;

use crate::error::{AttainmentError, Result};
use crate::models::{MarkSource, Student};

/// `None` and a missing entry both read as not yet graded.
#[derive(Debug, Clone, Default)]
pub struct Gradebook {
    students: Vec<Student>,
    maxima: HashMap<String, f64>,
    marks: HashMap<(String, String), Option<f64>>,
}

impl Gradebook {
    pub fn new<I, S>(maxima: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            students: Vec::new(),
            maxima: maxima.into_iter().map(|(id, max)| (id.into(), max)).collect(),
            marks: HashMap::new(),
        }
    }

    pub fn add_student(&mut self, student: Student) -> Result<()> {
        if self.students.iter().any(|s| s.id == student.id) {
            return Err(AttainmentError::validation(
                "roster.id",
                format!("duplicate student id {}", student.id),
            ));
        }
        self.students.push(student);
        Ok(())
    }

    /// Record (or clear, with `None`) a student's mark for a question.
    pub fn record(&mut self, student_id: &str, question_id: &str, mark: Option<f64>) -> Result<()> {
        let field = format!("marks.{student_id}.{question_id}");
        if !self.students.iter().any(|s| s.id == student_id) {
            return Err(AttainmentError::validation(field, "unknown student"));
        }
        let max = *self
            .maxima
            .get(question_id)
            .ok_or_else(|| AttainmentError::validation(field.clone(), "unknown question"))?;
        if let Some(value) = mark {
            if !(0.0..=max).contains(&value) {
                return Err(AttainmentError::validation(
                    field,
                    format!("{value} is outside 0..={max}"),
                ));
            }
        }
        self.marks
            .insert((student_id.to_string(), question_id.to_string()), mark);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.marks.clear();
    }

    pub fn graded_count(&self) -> usize {
        self.marks.values().filter(|mark| mark.is_some()).count()
    }
}

impl MarkSource for Gradebook {
    fn students(&self) -> &[Student] {
        &self.students
    }

    fn mark(&self, student_id: &str, question_id: &str) -> Option<f64> {
        self.marks
            .get(&(student_id.to_string(), question_id.to_string()))
            .copied()
            .flatten()
    }
}
