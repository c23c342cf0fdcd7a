use std::io::{BufRead, Write};

use anyhow::Result;
use movie_shelf_api::{
    CombineRequest, MembershipRequest, MovieView, Session, ShelfApi, UpdateMovieRequest,
};
use movie_shelf_core::{parse_release_year, MovieInput};
use tracing::debug;

const MENU: &str = "
1. Show all categories
2. Create new category
3. Delete category
4. Show items in category
5. Create new item
6. Add item to category
7. Remove item from category
8. Update item information
9. Combine categories
10. Exit";

const INVALID_NUMBER: &str = "That's not a valid number. Try again.";
const EMPTY_TEXT: &str = "Input cannot be empty. Try again.";

enum Flow {
    Continue,
    Exit,
}

/// Interactive numbered menu over one logged-in session. End of input exits.
pub(crate) struct Console<'a, R, W> {
    api: &'a ShelfApi,
    session: &'a Session,
    input: R,
    output: W,
}

impl<'a, R, W> Console<'a, R, W>
where
    R: BufRead,
    W: Write,
{
    pub(crate) fn new(api: &'a ShelfApi, session: &'a Session, input: R, output: W) -> Self {
        Self { api, session, input, output }
    }

    pub(crate) fn run(&mut self) -> Result<()> {
        loop {
            writeln!(self.output, "{MENU}")?;
            let Some(choice) = self.prompt_number("Enter your choice: ", 1, 10)? else {
                break;
            };
            debug!(choice, "console menu selection");

            let flow = match choice {
                1 => self.show_categories(),
                2 => self.create_category(),
                3 => self.delete_category(),
                4 => self.show_items_in_category(),
                5 => self.create_item(),
                6 => self.add_item_to_category(),
                7 => self.remove_item_from_category(),
                8 => self.update_item(),
                9 => self.combine_categories(),
                _ => Ok(Flow::Exit),
            };

            match flow {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => break,
                Err(err) => writeln!(self.output, "Error: {err:#}")?,
            }
        }

        writeln!(self.output, "Exiting...")?;
        self.output.flush()?;
        Ok(())
    }

    fn show_categories(&mut self) -> Result<Flow> {
        for category in self.api.categories(self.session)? {
            writeln!(self.output, "{} ({} movies)", category.name, category.movie_count)?;
        }
        Ok(Flow::Continue)
    }

    fn create_category(&mut self) -> Result<Flow> {
        let Some(name) = self.prompt_text("Enter category name: ")? else {
            return Ok(Flow::Exit);
        };
        let created = self.api.create_category(self.session, &name)?;
        writeln!(self.output, "Category created: {}", created.name)?;
        Ok(Flow::Continue)
    }

    fn delete_category(&mut self) -> Result<Flow> {
        let Some(name) = self.prompt_text("Enter category name to delete: ")? else {
            return Ok(Flow::Exit);
        };
        let deleted = self.api.delete_category(self.session, &name)?;
        writeln!(self.output, "Category deleted: {}", deleted.name)?;
        Ok(Flow::Continue)
    }

    fn show_items_in_category(&mut self) -> Result<Flow> {
        let Some(name) = self.prompt_text("Enter category name to show items: ")? else {
            return Ok(Flow::Exit);
        };
        for movie in self.api.category(self.session, &name)?.movies {
            writeln!(self.output, "{}", movie.display)?;
        }
        Ok(Flow::Continue)
    }

    fn create_item(&mut self) -> Result<Flow> {
        writeln!(self.output, "1. Create a Movie")?;
        writeln!(self.output, "2. Create an Owned Movie")?;
        let Some(kind) = self.prompt_number("Choose item type: ", 1, 2)? else {
            return Ok(Flow::Exit);
        };
        let Some(mut input) = self.prompt_movie(None)? else {
            return Ok(Flow::Exit);
        };
        if kind == 2 {
            let Some(series_name) = self.prompt_text("Enter series name: ")? else {
                return Ok(Flow::Exit);
            };
            input = input.with_series_name(&series_name);
        }

        let movie = self.api.add_movie(self.session, &input)?;
        writeln!(self.output, "Item created: {}", movie.display)?;
        Ok(Flow::Continue)
    }

    fn add_item_to_category(&mut self) -> Result<Flow> {
        let Some(request) = self.prompt_membership("Enter item title to add to category: ")? else {
            return Ok(Flow::Exit);
        };
        if self.api.add_to_category(self.session, &request)?.changed {
            writeln!(
                self.output,
                "Item {} added to category {}",
                request.movie_key, request.category
            )?;
        } else {
            writeln!(self.output, "Item {} is already in category {}", request.movie_key, request.category)?;
        }
        Ok(Flow::Continue)
    }

    fn remove_item_from_category(&mut self) -> Result<Flow> {
        let Some(request) =
            self.prompt_membership("Enter item title to remove from category: ")?
        else {
            return Ok(Flow::Exit);
        };
        if self.api.remove_from_category(self.session, &request)?.changed {
            writeln!(
                self.output,
                "Item {} removed from category {}",
                request.movie_key, request.category
            )?;
        } else {
            writeln!(self.output, "Item {} is not in category {}", request.movie_key, request.category)?;
        }
        Ok(Flow::Continue)
    }

    fn update_item(&mut self) -> Result<Flow> {
        let Some(raw) = self.prompt_text("Enter item title to update: ")? else {
            return Ok(Flow::Exit);
        };
        let Some(current) = self.find_movie(&raw)? else {
            return Ok(Flow::Continue);
        };
        let Some(mut input) = self.prompt_movie(Some(&current))? else {
            return Ok(Flow::Exit);
        };
        if let Some(series_name) = &current.series_name {
            let prompt = format!("Enter new series name (current: {series_name}): ");
            let Some(series_name) = self.prompt_text(&prompt)? else {
                return Ok(Flow::Exit);
            };
            input = input.with_series_name(&series_name);
        }

        let updated = self
            .api
            .update_movie(self.session, &UpdateMovieRequest { key: current.key, movie: input })?;
        writeln!(self.output, "Item updated: {}", updated.display)?;
        Ok(Flow::Continue)
    }

    fn combine_categories(&mut self) -> Result<Flow> {
        let Some(first) = self.prompt_text("Enter first category name: ")? else {
            return Ok(Flow::Exit);
        };
        let Some(second) = self.prompt_text("Enter second category name: ")? else {
            return Ok(Flow::Exit);
        };
        let combined =
            self.api.combine_categories(self.session, &CombineRequest { first, second })?;
        writeln!(self.output, "New combined category: {}", combined.name)?;
        Ok(Flow::Continue)
    }

    fn prompt_membership(&mut self, movie_prompt: &str) -> Result<Option<MembershipRequest>> {
        let Some(raw) = self.prompt_text(movie_prompt)? else {
            return Ok(None);
        };
        let Some(category) = self.prompt_text("Enter category name: ")? else {
            return Ok(None);
        };
        let movie_key = match self.find_movie(&raw)? {
            Some(movie) => movie.key,
            None => raw,
        };
        Ok(Some(MembershipRequest { category, movie_key }))
    }

    fn prompt_movie(&mut self, current: Option<&MovieView>) -> Result<Option<MovieInput>> {
        let (title_prompt, director_prompt, year_prompt) = match current {
            Some(movie) => (
                format!("Enter new title (current: {}): ", movie.title),
                format!("Enter new director (current: {}): ", movie.director),
                format!("Enter new release year (current: {}): ", movie.release_year),
            ),
            None => (
                "Enter title: ".to_string(),
                "Enter director: ".to_string(),
                "Enter release year: ".to_string(),
            ),
        };

        let Some(title) = self.prompt_text(&title_prompt)? else {
            return Ok(None);
        };
        let Some(director) = self.prompt_text(&director_prompt)? else {
            return Ok(None);
        };
        let Some(release_year) = self.prompt_year(&year_prompt)? else {
            return Ok(None);
        };
        Ok(Some(MovieInput::new(&title, &director, release_year)))
    }

    /// Match `raw` against movie keys first, then against titles when exactly
    /// one movie carries it.
    fn find_movie(&mut self, raw: &str) -> Result<Option<MovieView>> {
        let movies = self.api.movies(self.session)?;
        if let Some(movie) = movies.iter().find(|movie| movie.key == raw) {
            return Ok(Some(movie.clone()));
        }

        let mut by_title = movies.into_iter().filter(|movie| movie.title == raw);
        match (by_title.next(), by_title.next()) {
            (Some(movie), None) => Ok(Some(movie)),
            (Some(_), Some(_)) => {
                writeln!(self.output, "Several movies are titled {raw}; enter `director: title`.")?;
                Ok(None)
            }
            (None, _) => {
                writeln!(self.output, "No movie titled {raw}.")?;
                Ok(None)
            }
        }
    }

    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn prompt_text(&mut self, prompt: &str) -> Result<Option<String>> {
        loop {
            let Some(value) = self.read_line(prompt)? else {
                return Ok(None);
            };
            if !value.is_empty() {
                return Ok(Some(value));
            }
            writeln!(self.output, "{EMPTY_TEXT}")?;
        }
    }

    fn prompt_number(&mut self, prompt: &str, min: u8, max: u8) -> Result<Option<u8>> {
        loop {
            let Some(value) = self.read_line(prompt)? else {
                return Ok(None);
            };
            match value.parse::<u8>() {
                Ok(number) if (min..=max).contains(&number) => return Ok(Some(number)),
                _ => writeln!(self.output, "{INVALID_NUMBER}")?,
            }
        }
    }

    fn prompt_year(&mut self, prompt: &str) -> Result<Option<i32>> {
        loop {
            let Some(value) = self.read_line(prompt)? else {
                return Ok(None);
            };
            match parse_release_year(&value) {
                Ok(year) => return Ok(Some(year)),
                Err(err) => writeln!(self.output, "{err}")?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::path::PathBuf;

    use movie_shelf_api::Credentials;

    use super::*;

    fn unique_temp_db_path() -> PathBuf {
        std::env::temp_dir().join(format!("movie-shelf-console-{}.sqlite3", ulid::Ulid::new()))
    }

    fn logged_in(db_path: PathBuf) -> Result<(ShelfApi, Session)> {
        let api = ShelfApi::new(db_path);
        let credentials =
            Credentials { username: "marc".to_string(), password: "popcorn".to_string() };
        api.register(&credentials)?;
        let session = api.login(&credentials)?;
        Ok((api, session))
    }

    fn run_script(api: &ShelfApi, session: &Session, script: &str) -> Result<String> {
        let mut output = Vec::new();
        Console::new(api, session, Cursor::new(script.as_bytes()), &mut output).run()?;
        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    #[test]
    fn console_creates_and_files_a_movie() -> Result<()> {
        let db_path = unique_temp_db_path();
        let (api, session) = logged_in(db_path.clone())?;

        let transcript = run_script(
            &api,
            &session,
            "5\n1\nInception\nChristopher Nolan\n2010\n2\nSci-Fi\n6\nInception\nSci-Fi\n4\nSci-Fi\n1\n10\n",
        )?;

        assert!(transcript.contains("Item created: Inception (2010), Directed by Christopher Nolan"));
        assert!(transcript.contains("Item Christopher Nolan: Inception added to category Sci-Fi"));
        assert!(transcript.contains("Sci-Fi (1 movies)"));
        assert!(transcript.contains("All Movies (1 movies)"));
        assert!(transcript.ends_with("Exiting...\n"));
        let _ = std::fs::remove_file(&db_path);
        Ok(())
    }

    #[test]
    fn console_reprompts_on_invalid_input() -> Result<()> {
        let db_path = unique_temp_db_path();
        let (api, session) = logged_in(db_path.clone())?;

        let transcript =
            run_script(&api, &session, "eleven\n42\n5\n1\n\nAlien\nRidley Scott\n1492\n1979\n10\n")?;

        assert_eq!(transcript.matches(INVALID_NUMBER).count(), 2);
        assert!(transcript.contains(EMPTY_TEXT));
        assert!(transcript.contains("release year MUST be >= 1880, got 1492"));
        assert!(transcript.contains("Item created: Alien (1979), Directed by Ridley Scott"));
        let _ = std::fs::remove_file(&db_path);
        Ok(())
    }

    #[test]
    fn console_reports_operation_errors_and_keeps_running() -> Result<()> {
        let db_path = unique_temp_db_path();
        let (api, session) = logged_in(db_path.clone())?;

        let transcript = run_script(&api, &session, "3\nAll Movies\n9\nDrama\nComedy\n1\n")?;

        assert!(transcript.contains("Error: conflict: `All Movies` cannot be deleted"));
        assert!(transcript.contains("Error: not found: category `Drama`"));
        assert!(transcript.contains("All Movies (0 movies)"));
        assert!(transcript.ends_with("Exiting...\n"));
        let _ = std::fs::remove_file(&db_path);
        Ok(())
    }

    #[test]
    fn console_updates_owned_movie_with_series() -> Result<()> {
        let db_path = unique_temp_db_path();
        let (api, session) = logged_in(db_path.clone())?;

        let transcript = run_script(
            &api,
            &session,
            "5\n2\nSpirited Away\nHayao Miyazaki\n2001\nGhibli\n8\nSpirited Away\nSpirited Away\nHayao Miyazaki\n2002\nStudio Ghibli\n10\n",
        )?;

        assert!(transcript.contains("Enter new series name (current: Ghibli): "));
        assert!(transcript.contains(
            "Item updated: Spirited Away (2002), Directed by Hayao Miyazaki, part of Studio Ghibli"
        ));
        let _ = std::fs::remove_file(&db_path);
        Ok(())
    }
}
