use std::{collections::BTreeMap, fmt, hash::Hash};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use shared::{
    domain::{
        Campus, CampusId, Cohort, CohortId, Fields, Program, ProgramId, Student, StudentId,
    },
    protocol::BulkUploadStatus,
};
use tracing::{debug, warn};

use crate::actions::{Action, FetchFailure, FieldEdit, ListMode};

/// A record that can be keyed in an [`EntityList`].
pub trait Entity: fmt::Debug + Clone + PartialEq + Serialize + DeserializeOwned {
    type Id: fmt::Debug
        + fmt::Display
        + Copy
        + Ord
        + Hash
        + Serialize
        + DeserializeOwned;

    fn id(&self) -> Self::Id;
}

impl Entity for Campus {
    type Id = CampusId;

    fn id(&self) -> CampusId {
        self.campus_id
    }
}

impl Entity for Program {
    type Id = ProgramId;

    fn id(&self) -> ProgramId {
        self.program_id
    }
}

impl Entity for Cohort {
    type Id = CohortId;

    fn id(&self) -> CohortId {
        self.cohort_id
    }
}

impl Entity for Student {
    type Id = StudentId;

    fn id(&self) -> StudentId {
        self.student_id
    }
}

/// Ordered ids plus an id-to-record map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct EntityList<E: Entity> {
    pub ids: Vec<E::Id>,
    #[serde(rename = "byId")]
    pub by_id: BTreeMap<E::Id, E>,
}

impl<E: Entity> Default for EntityList<E> {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            by_id: BTreeMap::new(),
        }
    }
}

impl<E: Entity> EntityList<E> {
    /// Flattens a response array. Ids keep response order; a repeated id
    /// keeps its first position and its last record.
    pub fn from_records(records: impl IntoIterator<Item = E>) -> Self {
        let mut list = Self::default();
        for record in records {
            let id = record.id();
            if list.by_id.insert(id, record).is_none() {
                list.ids.push(id);
            }
        }
        list
    }

    pub fn first(&self) -> Option<E::Id> {
        self.ids.first().copied()
    }

    pub fn get(&self, id: E::Id) -> Option<&E> {
        self.by_id.get(&id)
    }

    pub fn contains(&self, id: E::Id) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Records in display order.
    pub fn iter(&self) -> impl Iterator<Item = &E> + '_ {
        self.ids.iter().filter_map(|id| self.by_id.get(id))
    }
}

/// Campus, program and cohort lists with their selections.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Hierarchy {
    pub campuses: EntityList<Campus>,
    pub programs: EntityList<Program>,
    pub cohorts: EntityList<Cohort>,
    pub current_campus: Option<CampusId>,
    pub current_program: Option<ProgramId>,
    pub current_cohort: Option<CohortId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AdminState {
    pub catalog: Hierarchy,
    pub dropdown: Hierarchy,
    pub students: EntityList<Student>,
    pub current_student_id: Option<StudentId>,
    /// Working copy of the selected student, edited by `SET_STUDENT_DATA`.
    pub current_student: Option<Student>,
    pub new_student: Fields,
    pub bulk_upload_status: Option<BulkUploadStatus>,
    pub errors: Vec<FetchFailure>,
}

impl AdminState {
    pub fn hierarchy(&self, mode: ListMode) -> &Hierarchy {
        match mode {
            ListMode::FetchAll => &self.catalog,
            ListMode::Dropdown => &self.dropdown,
        }
    }

    fn hierarchy_mut(&mut self, mode: ListMode) -> &mut Hierarchy {
        match mode {
            ListMode::FetchAll => &mut self.catalog,
            ListMode::Dropdown => &mut self.dropdown,
        }
    }

    /// The reducer. A selection must name an id present in its list:
    /// unknown ids are ignored, and replacing a list clears a selection
    /// whose id is gone. Changing or clearing a selection empties every
    /// level below it.
    pub fn apply(&mut self, action: &Action) {
        match action {
            Action::SetCampusList(list) => self.replace_campuses(list, ListMode::FetchAll),
            Action::SetCampusDropdownList(list) => self.replace_campuses(list, ListMode::Dropdown),
            Action::SetProgramList(list) => self.replace_programs(list, ListMode::FetchAll),
            Action::SetProgramDropdownList(list) => {
                self.replace_programs(list, ListMode::Dropdown)
            }
            Action::SetCohortList(list) => self.replace_cohorts(list, ListMode::FetchAll),
            Action::SetCohortDropdownList(list) => self.replace_cohorts(list, ListMode::Dropdown),
            Action::SetStudentList(list) => {
                self.students = list.clone();
                match self.current_student_id {
                    Some(id) if self.students.contains(id) => {
                        self.current_student = self.students.get(id).cloned();
                    }
                    _ => {
                        self.current_student_id = None;
                        self.current_student = None;
                    }
                }
            }
            Action::SetCurrentCampus { campus_id, mode } => {
                let hierarchy = self.hierarchy_mut(*mode);
                if !hierarchy.campuses.contains(*campus_id) {
                    warn!(%campus_id, %mode, "ignoring selection of unknown campus");
                } else if hierarchy.current_campus != Some(*campus_id) {
                    hierarchy.current_campus = Some(*campus_id);
                    self.clear_programs(*mode);
                }
            }
            Action::SetCurrentProgram { program_id, mode } => {
                let hierarchy = self.hierarchy_mut(*mode);
                if !hierarchy.programs.contains(*program_id) {
                    warn!(%program_id, %mode, "ignoring selection of unknown program");
                } else if hierarchy.current_program != Some(*program_id) {
                    hierarchy.current_program = Some(*program_id);
                    self.clear_cohorts(*mode);
                }
            }
            Action::SetCurrentCohort { cohort_id, mode } => {
                let hierarchy = self.hierarchy_mut(*mode);
                if !hierarchy.cohorts.contains(*cohort_id) {
                    warn!(%cohort_id, %mode, "ignoring selection of unknown cohort");
                } else if hierarchy.current_cohort != Some(*cohort_id) {
                    hierarchy.current_cohort = Some(*cohort_id);
                    self.clear_students(*mode);
                }
            }
            Action::SetCurrentStudent(student_id) => match self.students.get(*student_id) {
                Some(student) => {
                    self.current_student_id = Some(*student_id);
                    self.current_student = Some(student.clone());
                }
                None => warn!(%student_id, "ignoring selection of unknown student"),
            },
            Action::SetStudentData(FieldEdit { field, value }) => match &mut self.current_student {
                Some(student) => {
                    if !student.set_field(field, value.clone()) {
                        warn!(%field, %value, "refused student field edit");
                    }
                }
                None => debug!(%field, "no current student to edit"),
            },
            Action::SetNewStudentData(FieldEdit { field, value }) => {
                self.new_student.insert(field.clone(), value.clone());
            }
            Action::SetBulkUploadStatus(status) => {
                self.bulk_upload_status = Some(status.clone());
            }
            Action::FetchError(failure) => self.errors.push(failure.clone()),
        }
    }

    fn replace_campuses(&mut self, list: &EntityList<Campus>, mode: ListMode) {
        let hierarchy = self.hierarchy_mut(mode);
        hierarchy.campuses = list.clone();
        if hierarchy
            .current_campus
            .is_some_and(|id| !hierarchy.campuses.contains(id))
        {
            hierarchy.current_campus = None;
            self.clear_programs(mode);
        }
    }

    fn replace_programs(&mut self, list: &EntityList<Program>, mode: ListMode) {
        let hierarchy = self.hierarchy_mut(mode);
        hierarchy.programs = list.clone();
        if hierarchy
            .current_program
            .is_some_and(|id| !hierarchy.programs.contains(id))
        {
            hierarchy.current_program = None;
            self.clear_cohorts(mode);
        }
    }

    fn replace_cohorts(&mut self, list: &EntityList<Cohort>, mode: ListMode) {
        let hierarchy = self.hierarchy_mut(mode);
        hierarchy.cohorts = list.clone();
        if hierarchy
            .current_cohort
            .is_some_and(|id| !hierarchy.cohorts.contains(id))
        {
            hierarchy.current_cohort = None;
            self.clear_students(mode);
        }
    }

    // The levels below a changed selection belonged to the old parent.

    fn clear_programs(&mut self, mode: ListMode) {
        let hierarchy = self.hierarchy_mut(mode);
        hierarchy.programs = EntityList::default();
        hierarchy.current_program = None;
        self.clear_cohorts(mode);
    }

    fn clear_cohorts(&mut self, mode: ListMode) {
        let hierarchy = self.hierarchy_mut(mode);
        hierarchy.cohorts = EntityList::default();
        hierarchy.current_cohort = None;
        self.clear_students(mode);
    }

    /// Only the catalog owns the student list.
    fn clear_students(&mut self, mode: ListMode) {
        if mode == ListMode::FetchAll {
            self.students = EntityList::default();
            self.current_student_id = None;
            self.current_student = None;
        }
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
