//! Static source lists: crawler seeds, official pages to scrape, and the
//! subreddits and search terms used for community content.

pub const CRAWL_SEEDS: &[&str] = &["https://iso.mit.edu", "https://www.cmu.edu/oie"];

pub const WEBSITE_SOURCES: &[&str] = &[
    "https://www.uscis.gov/working-in-the-united-states/students-and-exchange-visitors/optional-practical-training-opt-for-f-1-students",
    "https://www.uscis.gov/working-in-the-united-states/students-and-exchange-visitors/optional-practical-training-extension-for-stem-students-stem-opt",
    "https://www.uscis.gov/working-in-the-united-states/stem-employment-pathways/nonimmigrant-pathways-for-stem-employment-in-the-united-states",
    "https://www.uscis.gov/working-in-the-united-states/students-and-exchange-visitors/students-and-employment/changing-to-a-nonimmigrant-f-or-m-student-status",
    "https://www.uscis.gov/working-in-the-united-states/students-and-exchange-visitors",
    "https://www.uscis.gov/i-765",
    "https://www.uscis.gov/laws-and-policy/other-resources/unlawful-presence-and-inadmissibility",
    "https://www.uscis.gov/policy-manual/volume-2-part-f",
    "https://www.uscis.gov/policy-manual/volume-2-part-f-chapter-1",
    "https://www.uscis.gov/policy-manual/volume-2-part-f-chapter-2",
    "https://www.uscis.gov/policy-manual/volume-2-part-f-chapter-3",
    "https://www.uscis.gov/policy-manual/volume-2-part-f-chapter-4",
    "https://www.uscis.gov/policy-manual/volume-2-part-f-chapter-5",
    "https://www.uscis.gov/policy-manual/volume-2-part-f-chapter-6",
    "https://www.uscis.gov/policy-manual/volume-2-part-f-chapter-7",
    "https://www.uscis.gov/policy-manual/volume-2-part-f-chapter-8",
    "https://www.uscis.gov/policy-manual/volume-2-part-f-chapter-9",
    "https://www.uscis.gov/archive/foreign-academic-students",
    "https://studyinthestates.dhs.gov/stem-opt-hub/for-employers/employer-site-visits",
    "https://studyinthestates.dhs.gov/stem-opt-hub/additional-resources/form-i-983-overview",
    "https://studyinthestates.dhs.gov/stem-opt-hub/for-employers/employers-and-the-form-i-983",
    "https://studyinthestates.dhs.gov/sevis-help-hub/student-records",
    "https://studyinthestates.dhs.gov/stem-opt-hub/for-students/students-determining-stem-opt-extension-eligibility",
    "https://studyinthestates.dhs.gov/stem-opt-hub/for-students/students-stem-opt-reporting-requirements",
    "https://studyinthestates.dhs.gov/stem-opt-hub/for-students/students-and-the-form-i-983",
    "https://studyinthestates.dhs.gov/stem-opt-hub/for-schools/dsos-recommending-students-for-the-stem-opt-extension",
    "https://studyinthestates.dhs.gov/sevis-help-hub/student-records/fm-student-employment/f-1-curricular-practical-training-cpt",
    "https://studyinthestates.dhs.gov/students/maintaining-status",
    "https://studyinthestates.dhs.gov/students/study/full-course-of-study",
    "https://studyinthestates.dhs.gov/students/study/traveling-as-an-international-student",
    "https://studyinthestates.dhs.gov/students/study/driving-in-the-united-states",
    "https://studyinthestates.dhs.gov/students/study/maintain-f-and-m-status-in-emergency-events",
    "https://studyinthestates.dhs.gov/students/study/transferring-to-another-school",
    "https://studyinthestates.dhs.gov/students/prepare/student-forms",
    "https://studyinthestates.dhs.gov/students/prepare/financial-ability",
    "https://studyinthestates.dhs.gov/students/prepare/students-and-the-form-i-20",
    "https://studyinthestates.dhs.gov/students/prepare/paying-the-i-901-sevis-fee",
    "https://studyinthestates.dhs.gov/sevis-help-hub/student-records/fm-student-employment/f-1-optional-practical-training-opt",
    "https://studyinthestates.dhs.gov/sevis-help-hub/student-records/fm-status/f-1-cap-gap-extension",
    "https://www.ice.gov/sevis/overview",
    "https://www.ice.gov/sevis/practical-training",
    "https://www.irs.gov/individuals/international-taxpayers/foreign-students-scholars-teachers-researchers-and-exchange-visitors",
    "https://www.irs.gov/individuals/international-taxpayers/foreign-student-liability-for-social-security-and-medicare-taxes",
    "https://travel.state.gov/content/travel/en/us-visas/study/student-visa.html",
    "https://www.immigrationlawgroup.net/understanding-day-1-cpt-and-whether-it-is-right-for-you",
    "https://blog.sprintax.com/f1-visa-tax-return-guide-international-students/",
    "https://cptdog.com/blogs/day-1-cpt-risks",
    "https://stilt.com/education/day-one-cpt-second-masters-no-h1b-us/",
];

pub const SUBREDDITS: &[&str] = &["f1visa", "optcpt", "immigration", "internationalstudents"];

pub const SEARCH_TERMS: &[&str] = &[
    "Day 1 CPT",
    "OPT STEM extension",
    "F1 visa renewal",
    "CPT internship",
    "F1 visa interview",
    "OPT unemployment",
    "STEM OPT",
    "F1 transfer",
    "F1 grace period",
];

pub fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|item| item.to_string()).collect()
}
